//! Detection Adapter
//!
//! Sends a page to the detection provider and turns the untrusted response
//! into clamped region proposals. Any failure yields an empty outcome: the user
//! falls back to drawing regions by hand.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::encode_png;
use crate::page::Page;
use crate::region::BoxRect;

use super::provider::DetectionProvider;
use super::types::{
    CoordinateConvention, DetectionError, DetectionOutcome, DetectionWarning, Proposal,
    RawDetection,
};

/// Minimum width/height (percent) of a normalized proposal
const MIN_PROPOSAL_SIZE: f64 = 1.0;

/// Adapter around one detection provider
pub struct DetectionAdapter {
    provider: Arc<dyn DetectionProvider>,
    timeout: Duration,
}

impl DetectionAdapter {
    pub fn new(provider: Arc<dyn DetectionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Detect regions on one page. Never fails.
    pub async fn detect_page(&self, page: &Page) -> DetectionOutcome {
        match self.try_detect(page).await {
            Ok(outcome) => {
                if outcome.proposals.is_empty() {
                    tracing::info!(provider = self.provider.name(), "Detection returned no regions");
                }
                outcome
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Detection failed, falling back to manual annotation"
                );
                DetectionOutcome::empty()
            }
        }
    }

    async fn try_detect(&self, page: &Page) -> Result<DetectionOutcome, DetectionError> {
        let png = encode_png(page.raster()).map_err(|e| DetectionError::Encode(e.to_string()))?;

        let raw = tokio::time::timeout(self.timeout, self.provider.detect(&png))
            .await
            .map_err(|_| DetectionError::Timeout(self.timeout.as_secs()))??;

        let convention = self.provider.convention();
        let mut outcome = DetectionOutcome {
            proposals: Vec::with_capacity(raw.rows.len()),
            page_text: raw.page_text,
            warnings: raw.warnings,
        };
        for (row, detection) in &raw.rows {
            if let Some(proposal) = normalize_detection(*row, detection, convention, &mut outcome.warnings) {
                outcome.proposals.push(proposal);
            }
        }

        for warning in &outcome.warnings {
            tracing::warn!(provider = self.provider.name(), "Detection warning: {}", warning);
        }
        Ok(outcome)
    }
}

/// Normalize one row under the provider's declared convention.
///
/// Values outside the declared range are flagged and clamped; they are never
/// reinterpreted under a different convention.
pub fn normalize_detection(
    row: usize,
    detection: &RawDetection,
    convention: CoordinateConvention,
    warnings: &mut Vec<DetectionWarning>,
) -> Option<Proposal> {
    let mut warn = |message: String| warnings.push(DetectionWarning { row, message });

    let raw = match (&detection.bbox, &detection.box_2d) {
        (Some(b), _) => [b.x, b.y, b.width, b.height],
        (None, Some(coords)) if coords.len() == 4 => {
            // [ymin, xmin, ymax, xmax]
            [coords[1], coords[0], coords[3] - coords[1], coords[2] - coords[0]]
        }
        (None, Some(coords)) => {
            warn(format!("box_2d has {} values, expected 4", coords.len()));
            return None;
        }
        (None, None) => {
            warn("row has no box".to_string());
            return None;
        }
    };

    if raw.iter().any(|v| !v.is_finite()) {
        warn("non-numeric coordinates".to_string());
        return None;
    }

    let max = convention.max_raw();
    let [x, y, w, h] = raw;
    if x < 0.0 || y < 0.0 || x + w > max * 1.001 || y + h > max * 1.001 || w < 0.0 || h < 0.0 {
        warn(format!(
            "coordinates {:?} fall outside the declared {:?} range",
            raw, convention
        ));
    } else if convention != CoordinateConvention::Fraction && raw.iter().all(|v| *v <= 1.0) {
        warn(format!(
            "coordinates {:?} look fractional under the declared {:?} convention",
            raw, convention
        ));
    }

    let clamp_origin = |v: f64| convention.to_percent(v).clamp(0.0, 100.0);
    let clamp_extent = |v: f64| convention.to_percent(v).clamp(MIN_PROPOSAL_SIZE, 100.0);
    let rect = BoxRect::new(clamp_origin(x), clamp_origin(y), clamp_extent(w), clamp_extent(h));

    let text = detection
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let reference = detection
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    let confidence = detection
        .confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0));

    Some(Proposal {
        rect,
        text,
        reference,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::provider::MockDetectionProvider;
    use crate::detect::types::RawBox;
    use image::RgbaImage;

    fn adapter(body: Result<&str, &str>, convention: CoordinateConvention) -> DetectionAdapter {
        let provider = MockDetectionProvider {
            body: body.map(str::to_string).map_err(str::to_string),
            convention,
            delay: Duration::ZERO,
        };
        DetectionAdapter::new(Arc::new(provider), Duration::from_secs(5))
    }

    fn page() -> Page {
        Page::new(RgbaImage::new(20, 20))
    }

    fn boxed(x: f64, y: f64, width: f64, height: f64) -> RawDetection {
        RawDetection {
            bbox: Some(RawBox { x, y, width, height }),
            ..Default::default()
        }
    }

    #[test]
    fn test_percent_box_passes_through() {
        let mut warnings = Vec::new();
        let p = normalize_detection(0, &boxed(5.0, 10.0, 45.0, 20.0), CoordinateConvention::Percent, &mut warnings)
            .unwrap();
        assert_eq!(p.rect, BoxRect::new(5.0, 10.0, 45.0, 20.0));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_box_2d_permille() {
        let detection = RawDetection {
            box_2d: Some(vec![100.0, 50.0, 300.0, 500.0]),
            confidence: Some(3.0),
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let p = normalize_detection(0, &detection, CoordinateConvention::PerMille, &mut warnings).unwrap();
        assert_eq!(p.rect, BoxRect::new(5.0, 10.0, 45.0, 20.0));
        assert_eq!(p.confidence, Some(1.0));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_out_of_range_is_flagged_and_clamped() {
        let mut warnings = Vec::new();
        let p = normalize_detection(
            3,
            &boxed(-5.0, 50.0, 400.0, 0.0),
            CoordinateConvention::Percent,
            &mut warnings,
        )
        .unwrap();
        assert_eq!(p.rect.x, 0.0);
        assert_eq!(p.rect.width, 100.0);
        assert_eq!(p.rect.height, MIN_PROPOSAL_SIZE);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].row, 3);
    }

    #[test]
    fn test_fraction_values_under_percent_are_flagged_not_rescaled() {
        let mut warnings = Vec::new();
        let p = normalize_detection(0, &boxed(0.1, 0.2, 0.5, 0.5), CoordinateConvention::Percent, &mut warnings)
            .unwrap();
        assert_eq!(p.rect.x, 0.1);
        assert_eq!(p.rect.width, MIN_PROPOSAL_SIZE);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_missing_box_is_skipped() {
        let mut warnings = Vec::new();
        let detection = RawDetection {
            text: Some("orphan".to_string()),
            ..Default::default()
        };
        assert!(normalize_detection(0, &detection, CoordinateConvention::Percent, &mut warnings).is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_detect_page_normalizes() {
        let adapter = adapter(
            Ok(r#"{"regions": [{"box": {"x": 5, "y": 10, "width": 45, "height": 20}, "text": " shalom ", "reference": "Genesis 1:1", "confidence": 0.8}], "text": "page text"}"#),
            CoordinateConvention::Percent,
        );
        let outcome = adapter.detect_page(&page()).await;
        assert_eq!(outcome.proposals.len(), 1);
        let p = &outcome.proposals[0];
        assert_eq!(p.text.as_deref(), Some("shalom"));
        assert_eq!(p.reference.as_deref(), Some("Genesis 1:1"));
        assert_eq!(outcome.page_text.as_deref(), Some("page text"));
    }

    #[tokio::test]
    async fn test_detect_page_failure_is_empty() {
        let adapter = adapter(Err("503 Service Unavailable"), CoordinateConvention::Percent);
        let outcome = adapter.detect_page(&page()).await;
        assert!(outcome.is_empty());
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_detect_page_garbage_is_empty() {
        let adapter = adapter(Ok("sorry, no JSON today"), CoordinateConvention::Percent);
        assert!(adapter.detect_page(&page()).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_detection_times_out_empty() {
        let provider = MockDetectionProvider {
            body: Ok(r#"[{"box": {"x": 5, "y": 10, "width": 45, "height": 20}}]"#.to_string()),
            convention: CoordinateConvention::Percent,
            delay: Duration::from_secs(30),
        };
        let adapter = DetectionAdapter::new(Arc::new(provider), Duration::from_secs(5));

        let outcome = adapter.detect_page(&page()).await;
        assert!(outcome.proposals.is_empty());
        assert!(outcome.page_text.is_none());
    }
}
