//! Image usability scoring.
//!
//! Photos are judged on pixel dimensions and orientation only: a full-body
//! shot must be portrait, at least 400x800, and scores higher the larger and
//! taller it is.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageReader};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MIN_WIDTH: u32 = 400;
pub const MIN_HEIGHT: u32 = 800;

const BASE_SCORE: f32 = 0.5;
const MAX_SCORE: f32 = 0.9;

/// Score given to unreadable images when validation is permissive.
pub const PERMISSIVE_UNREADABLE_SCORE: f32 = 0.7;

/// Trait for image resources handed to the pipeline.
///
/// Only the dimensions are needed for quality scoring; landmark detectors
/// may ask for the decoded pixels.
pub trait ImageResource: Send + Sync {
    /// Pixel dimensions as `(width, height)`.
    fn dimensions(&self) -> Result<(u32, u32)>;

    /// Decode the full image.
    fn decode(&self) -> Result<DynamicImage> {
        Err(Error::Processing("image resource carries no pixel data".into()))
    }
}

/// An encoded image (PNG, JPEG, ...) held in memory.
#[derive(Debug, Clone)]
pub struct BodyImage {
    data: Arc<[u8]>,
}

impl BodyImage {
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl ImageResource for BodyImage {
    fn dimensions(&self) -> Result<(u32, u32)> {
        // Reads the header only.
        let reader = ImageReader::new(Cursor::new(self.as_bytes())).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }

    fn decode(&self) -> Result<DynamicImage> {
        Ok(image::load_from_memory(self.as_bytes())?)
    }
}

impl ImageResource for DynamicImage {
    fn dimensions(&self) -> Result<(u32, u32)> {
        Ok(GenericImageView::dimensions(self))
    }

    fn decode(&self) -> Result<DynamicImage> {
        Ok(self.clone())
    }
}

/// Dimensions without pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl ImageResource for ImageSize {
    fn dimensions(&self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }
}

/// How image checks affect acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Reject images that fail the dimension or orientation checks.
    #[default]
    Strict,
    /// Accept every image; scores are still computed.
    Permissive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImageQuality {
    pub is_valid: bool,
    /// Usability score in [0, 0.9].
    pub score: f32,
}

impl ImageQuality {
    /// Score a `width` x `height` image under strict rules.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let meets_minimum = width >= MIN_WIDTH && height >= MIN_HEIGHT;
        let portrait = height > width;

        let mut score = BASE_SCORE;

        if width >= 800 && height >= 1600 {
            score += 0.3;
        } else if width >= 600 && height >= 1200 {
            score += 0.2;
        } else if meets_minimum {
            score += 0.1;
        }

        if portrait && height as f32 / width as f32 >= 2.0 {
            score += 0.2;
        } else if portrait {
            score += 0.1;
        }

        Self {
            is_valid: meets_minimum && portrait,
            score: score.min(MAX_SCORE),
        }
    }

    /// Result for an image whose dimensions could not be read.
    pub fn unreadable(mode: ValidationMode) -> Self {
        match mode {
            ValidationMode::Strict => Self {
                is_valid: false,
                score: 0.0,
            },
            ValidationMode::Permissive => Self {
                is_valid: true,
                score: PERMISSIVE_UNREADABLE_SCORE,
            },
        }
    }

    fn with_mode(self, mode: ValidationMode) -> Self {
        match mode {
            ValidationMode::Strict => self,
            ValidationMode::Permissive => Self {
                is_valid: true,
                ..self
            },
        }
    }
}

/// Assess one image. Never fails: unreadable images map to
/// [`ImageQuality::unreadable`].
pub async fn assess<I: ImageResource + ?Sized>(image: &I, mode: ValidationMode) -> ImageQuality {
    match image.dimensions() {
        Ok((width, height)) => {
            let quality = ImageQuality::from_dimensions(width, height).with_mode(mode);
            tracing::debug!(
                width,
                height,
                valid = quality.is_valid,
                score = quality.score,
                "image assessed"
            );
            quality
        }
        Err(e) => {
            tracing::debug!(error = %e, ?mode, "image unreadable");
            ImageQuality::unreadable(mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_luma8(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn high_resolution_tall_image_is_capped() {
        let q = ImageQuality::from_dimensions(1000, 2000);
        assert!(q.is_valid);
        assert_abs_diff_eq!(q.score, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn medium_resolution_portrait() {
        // 0.5 + 0.2 (>= 600x1200) + 0.1 (portrait, ratio < 2)
        let q = ImageQuality::from_dimensions(700, 1300);
        assert!(q.is_valid);
        assert_abs_diff_eq!(q.score, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn minimum_size_portrait() {
        // 0.5 + 0.1 (minimum) + 0.2 (ratio exactly 2)
        let q = ImageQuality::from_dimensions(400, 800);
        assert!(q.is_valid);
        assert_abs_diff_eq!(q.score, 0.8, epsilon = 1e-6);
    }

    #[test]
    fn landscape_is_invalid() {
        // Meets the minimums but earns no orientation bonus.
        let q = ImageQuality::from_dimensions(2000, 1000);
        assert!(!q.is_valid);
        assert_abs_diff_eq!(q.score, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn too_small_is_invalid() {
        let q = ImageQuality::from_dimensions(300, 700);
        assert!(!q.is_valid);
        // Tall-portrait bonus still applies.
        assert_abs_diff_eq!(q.score, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn unreadable_by_mode() {
        assert_eq!(
            ImageQuality::unreadable(ValidationMode::Strict),
            ImageQuality {
                is_valid: false,
                score: 0.0
            }
        );
        let permissive = ImageQuality::unreadable(ValidationMode::Permissive);
        assert!(permissive.is_valid);
        assert_abs_diff_eq!(permissive.score, 0.7, epsilon = 1e-6);
    }

    #[test]
    fn encoded_image_dimensions() {
        let img = BodyImage::from_bytes(png_bytes(40, 90));
        assert_eq!(img.dimensions().unwrap(), (40, 90));
        assert_eq!(img.decode().unwrap().height(), 90);
    }

    #[test]
    fn garbage_bytes_fail_to_read() {
        let img = BodyImage::from_bytes(vec![0u8, 1, 2, 3]);
        assert!(img.dimensions().is_err());
    }

    #[tokio::test]
    async fn permissive_mode_accepts_everything() {
        let landscape = ImageSize::new(2000, 1000);
        let strict = assess(&landscape, ValidationMode::Strict).await;
        let permissive = assess(&landscape, ValidationMode::Permissive).await;
        assert!(!strict.is_valid);
        assert!(permissive.is_valid);
        assert_eq!(strict.score, permissive.score);

        let broken = BodyImage::from_bytes(vec![0u8; 8]);
        assert!(!assess(&broken, ValidationMode::Strict).await.is_valid);
        assert!(assess(&broken, ValidationMode::Permissive).await.is_valid);
    }
}
