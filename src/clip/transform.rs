//! 2D affine transforms
//!
//! A transform maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`, the same
//! layout a canvas `setTransform` uses. Image coordinates are y-down, so a
//! positive rotation turns clockwise on screen.

/// An affine transform value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    pub fn rotate_degrees(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            e: 0.0,
            f: 0.0,
        }
    }

    /// Apply `self` first, then `next`
    pub fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            e: next.a * self.e + next.c * self.f + next.e,
            f: next.b * self.e + next.d * self.f + next.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` when the transform is singular
    pub fn inverse(&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Affine {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            e: (self.c * self.f - self.d * self.e) / det,
            f: (self.b * self.e - self.a * self.f) / det,
        })
    }

    /// Rotate a `src_w` x `src_h` raster about its center and place that center
    /// at the center of a `dst_w` x `dst_h` canvas.
    pub fn center_rotation(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64, degrees: f64) -> Affine {
        Affine::translate(-src_w / 2.0, -src_h / 2.0)
            .then(Affine::rotate_degrees(degrees))
            .then(Affine::translate(dst_w / 2.0, dst_h / 2.0))
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-9 && (actual.1 - expected.1).abs() < 1e-9,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    #[test]
    fn test_rotate_is_clockwise_in_image_space() {
        // +x axis turns onto +y (down) after 90 degrees
        assert_close(Affine::rotate_degrees(90.0).apply(1.0, 0.0), (0.0, 1.0));
    }

    #[test]
    fn test_then_order() {
        let t = Affine::translate(10.0, 0.0).then(Affine::rotate_degrees(90.0));
        assert_close(t.apply(0.0, 0.0), (0.0, 10.0));

        let t = Affine::rotate_degrees(90.0).then(Affine::translate(10.0, 0.0));
        assert_close(t.apply(0.0, 0.0), (10.0, 0.0));
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Affine::center_rotation(40.0, 20.0, 20.0, 40.0, 90.0);
        let inv = t.inverse().unwrap();
        let (x, y) = t.apply(3.0, 7.0);
        assert_close(inv.apply(x, y), (3.0, 7.0));
    }

    #[test]
    fn test_center_rotation_maps_centers() {
        let t = Affine::center_rotation(40.0, 20.0, 30.0, 50.0, 33.0);
        assert_close(t.apply(20.0, 10.0), (15.0, 25.0));
    }

    #[test]
    fn test_singular_has_no_inverse() {
        let flat = Affine {
            a: 1.0,
            b: 2.0,
            c: 2.0,
            d: 4.0,
            e: 0.0,
            f: 0.0,
        };
        assert!(flat.inverse().is_none());
    }
}
