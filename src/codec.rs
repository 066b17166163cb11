//! Raster encoding helpers
//!
//! PNG encoding for provider requests, `data:` URLs for the persisted sheet, and
//! unwrapping of fenced model output.

use std::io::Cursor;

use base64::Engine;
use image::RgbaImage;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Not an image data URL: {0}")]
    InvalidDataUrl(String),
}

/// Encode a raster as PNG bytes
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    Ok(buffer)
}

/// Encode a raster as a self-contained `data:image/png;base64,...` URL
pub fn to_data_url(image: &RgbaImage) -> Result<String, CodecError> {
    let png = encode_png(image)?;
    Ok(format!(
        "{}{}",
        PNG_DATA_URL_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(png)
    ))
}

/// Decode a `data:image/...;base64,` URL back into a raster
pub fn from_data_url(url: &str) -> Result<RgbaImage, CodecError> {
    let (header, payload) = url
        .split_once(',')
        .ok_or_else(|| CodecError::InvalidDataUrl(truncate(url)))?;
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(CodecError::InvalidDataUrl(truncate(header)));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    let decoded =
        image::load_from_memory(&bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok(decoded.to_rgba8())
}

/// Strip a Markdown code fence (```json ... ```) around a model response
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate(text: &str) -> String {
    text.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_data_url_preserves_pixels() {
        let img = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 40, y as u8 * 90, 5, 128]));
        let url = to_data_url(&img).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(from_data_url(&url).unwrap(), img);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_rejects_non_image_urls() {
        assert!(matches!(
            from_data_url("https://example.com/a.png"),
            Err(CodecError::InvalidDataUrl(_))
        ));
        assert!(matches!(
            from_data_url("data:image/png;base64,!!!"),
            Err(CodecError::Decode(_))
        ));
    }
}
