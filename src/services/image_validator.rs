//! Input gating before a search is issued
//!
//! Only the MIME type and the size limit can reject an image. Decoding and
//! the quality heuristic are best-effort: their failures become warnings.

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ValidationConfig;
use crate::models::{FileSource, ImageSource};

/// Score used when the image cannot be decoded for analysis
pub const DEFAULT_QUALITY_SCORE: f64 = 0.5;

/// Brightness delta that maps to a sharpness factor of 1.0
const SHARPNESS_REFERENCE: f64 = 50.0;
/// Mean brightness that maps to an exposure factor of 1.0
const BRIGHTNESS_REFERENCE: f64 = 128.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub accepted: bool,
    pub warnings: Vec<String>,
    /// Why the image was rejected, when `accepted` is false
    pub rejection: Option<String>,
    /// Heuristic quality in `[0, 1]`, absent for URL sources and rejections
    pub quality_score: Option<f64>,
}

impl ValidationOutcome {
    fn accepted(warnings: Vec<String>, quality_score: Option<f64>) -> Self {
        Self {
            accepted: true,
            warnings,
            rejection: None,
            quality_score,
        }
    }

    fn rejected(reason: String) -> Self {
        Self {
            accepted: false,
            warnings: Vec::new(),
            rejection: Some(reason),
            quality_score: None,
        }
    }
}

pub struct ImageValidator {
    config: ValidationConfig,
}

impl ImageValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub async fn validate(&self, source: &ImageSource) -> ValidationOutcome {
        match source {
            // Already checked to be an absolute http(s) URL; the service fetches it
            ImageSource::Url(_) => ValidationOutcome::accepted(Vec::new(), None),
            ImageSource::File(file) => self.validate_file(file).await,
        }
    }

    async fn validate_file(&self, file: &FileSource) -> ValidationOutcome {
        if let Err(reason) = self.check_limits(file) {
            debug!("Rejected {}: {}", file.file_name, reason);
            return ValidationOutcome::rejected(reason);
        }

        let mut warnings = Vec::new();
        let bytes = file.bytes.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| Self::quality_score(&img))
        })
        .await;

        let score = match decoded {
            Ok(Ok(score)) => score,
            Ok(Err(e)) => {
                warn!("Integrity check failed for {}: {}", file.file_name, e);
                warnings.push(format!("Image could not be decoded locally: {e}"));
                DEFAULT_QUALITY_SCORE
            }
            Err(e) => {
                warn!("Image analysis task failed for {}: {}", file.file_name, e);
                warnings.push("Image analysis was unavailable".to_string());
                DEFAULT_QUALITY_SCORE
            }
        };

        if score < self.config.quality_threshold {
            warnings.push(format!(
                "Low image quality ({:.0}%): blurry or dark images may not match well",
                score * 100.0
            ));
        }

        debug!(
            "Validated {} ({} bytes, quality {:.2}, {} warning(s))",
            file.file_name,
            file.size_bytes,
            score,
            warnings.len()
        );
        ValidationOutcome::accepted(warnings, Some(score))
    }

    /// Hard limits: supported MIME type and maximum size
    fn check_limits(&self, file: &FileSource) -> Result<(), String> {
        let mime = normalize_mime(&file.mime_type);
        if !self
            .config
            .supported_mime_types
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(&mime))
        {
            return Err(format!(
                "Unsupported image type '{}', expected one of: {}",
                file.mime_type,
                self.config.supported_mime_types.join(", ")
            ));
        }

        if file.size_bytes > self.config.max_file_size {
            return Err(format!(
                "Image is {:.1}MB, the maximum is {:.0}MB",
                file.size_bytes as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            ));
        }

        Ok(())
    }

    /// `min(1, (mean brightness delta / 50) * (mean brightness / 128))`
    ///
    /// Brightness is the RGB mean of each pixel; the delta is taken between
    /// consecutive pixels in row-major order.
    pub fn quality_score(img: &DynamicImage) -> f64 {
        let rgba = img.to_rgba8();
        let pixel_count = rgba.width() as u64 * rgba.height() as u64;
        if pixel_count == 0 {
            return 0.0;
        }

        let mut brightness_sum = 0.0f64;
        let mut delta_sum = 0.0f64;
        let mut previous: Option<f64> = None;

        for pixel in rgba.pixels() {
            let [r, g, b, _] = pixel.0;
            let brightness = (r as f64 + g as f64 + b as f64) / 3.0;
            brightness_sum += brightness;
            if let Some(prev) = previous {
                delta_sum += (brightness - prev).abs();
            }
            previous = Some(brightness);
        }

        let avg_brightness = brightness_sum / pixel_count as f64;
        let avg_sharpness = if pixel_count > 1 {
            delta_sum / (pixel_count - 1) as f64
        } else {
            0.0
        };

        ((avg_sharpness / SHARPNESS_REFERENCE) * (avg_brightness / BRIGHTNESS_REFERENCE)).min(1.0)
    }
}

/// Lowercase, drop parameters, and fold the common `image/jpg` alias
fn normalize_mime(mime: &str) -> String {
    let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        "image/x-ms-bmp" => "image/bmp".to_string(),
        _ => essence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
    use rstest::rstest;
    use std::io::Cursor;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn checkerboard(size: u32) -> RgbImage {
        ImageBuffer::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    fn validator() -> ImageValidator {
        ImageValidator::new(ValidationConfig::default())
    }

    #[rstest]
    #[case("image/png", true)]
    #[case("image/JPEG", true)]
    #[case("image/jpg", true)]
    #[case("image/webp; charset=binary", true)]
    #[case("image/avif", true)]
    #[case("image/tiff", false)]
    #[case("application/pdf", false)]
    #[tokio::test]
    async fn test_mime_gate(#[case] mime: &str, #[case] accepted: bool) {
        let source = ImageSource::from_file_bytes(encode_png(&checkerboard(8)), mime, "input");
        let outcome = validator().validate(&source).await;
        assert_eq!(outcome.accepted, accepted, "mime {mime}");
        assert_eq!(outcome.rejection.is_some(), !accepted);
    }

    #[tokio::test]
    async fn test_oversized_file_rejected() {
        let config = ValidationConfig {
            max_file_size: 16,
            ..Default::default()
        };
        let source = ImageSource::from_file_bytes(vec![0u8; 17], "image/png", "big.png");

        let outcome = ImageValidator::new(config).validate(&source).await;

        assert!(!outcome.accepted);
        assert!(outcome.rejection.unwrap().contains("maximum"));
    }

    #[tokio::test]
    async fn test_undecodable_bytes_warn_but_accept() {
        let source = ImageSource::from_file_bytes(vec![1u8, 2, 3, 4], "image/png", "broken.png");

        let outcome = validator().validate(&source).await;

        assert!(outcome.accepted);
        assert_eq!(outcome.quality_score, Some(DEFAULT_QUALITY_SCORE));
        assert!(outcome.warnings.iter().any(|w| w.contains("could not be decoded")));
        assert!(outcome.warnings.iter().any(|w| w.contains("Low image quality")));
    }

    #[tokio::test]
    async fn test_sharp_bright_image_has_no_warnings() {
        let source =
            ImageSource::from_file_bytes(encode_png(&checkerboard(32)), "image/png", "sharp.png");

        let outcome = validator().validate(&source).await;

        assert!(outcome.accepted);
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(outcome.quality_score, Some(1.0));
    }

    #[tokio::test]
    async fn test_flat_image_warns_low_quality() {
        let flat: RgbImage = ImageBuffer::from_pixel(32, 32, Rgb([128, 128, 128]));
        let source = ImageSource::from_file_bytes(encode_png(&flat), "image/png", "flat.png");

        let outcome = validator().validate(&source).await;

        assert!(outcome.accepted);
        assert_eq!(outcome.quality_score, Some(0.0));
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_url_sources_skip_checks() {
        let source = ImageSource::from_url("https://example.com/frame.jpg").unwrap();
        let outcome = validator().validate(&source).await;
        assert!(outcome.accepted);
        assert!(outcome.warnings.is_empty());
        assert!(outcome.quality_score.is_none());
    }

    #[test]
    fn test_quality_score_formula() {
        // High contrast saturates the score
        let img = DynamicImage::ImageRgb8(checkerboard(2));
        let score = ImageValidator::quality_score(&img);
        assert_eq!(score, 1.0);

        // Gentle gradient: delta ~10, brightness ~ 100
        let gradient: RgbImage =
            ImageBuffer::from_fn(4, 1, |x, _| Rgb([(85 + x * 10) as u8; 3]));
        let score = ImageValidator::quality_score(&DynamicImage::ImageRgb8(gradient));
        let expected = (10.0 / 50.0) * (100.0 / 128.0);
        assert!((score - expected).abs() < 1e-9, "score {score}");
    }
}
