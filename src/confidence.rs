//! Confidence scoring.
//!
//! The score is a weighted blend of the image quality scores, and of the
//! landmark quality when pose detection contributed. It is capped below 1.0:
//! the estimate is never certain.

use serde::Serialize;

pub const MAX_CONFIDENCE: f32 = 0.98;

/// Signals available for scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signals {
    /// Front and side image quality only.
    Images { front: f32, side: f32 },
    /// Image quality plus landmark quality from the front image.
    WithLandmarks { front: f32, side: f32, landmarks: f32 },
}

/// Combine quality signals into a confidence in [0, 0.98].
pub fn score(signals: Signals) -> f32 {
    let raw = match signals {
        Signals::Images { front, side } => front * 0.6 + side * 0.4,
        Signals::WithLandmarks {
            front,
            side,
            landmarks,
        } => front * 0.4 + side * 0.3 + landmarks * 0.3,
    };
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_CONFIDENCE)
}

/// Coarse banding of a confidence score for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Moderate,
    Good,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_score(confidence: f32) -> Self {
        if confidence >= 0.9 {
            ConfidenceLevel::VeryHigh
        } else if confidence >= 0.8 {
            ConfidenceLevel::High
        } else if confidence >= 0.7 {
            ConfidenceLevel::Good
        } else if confidence >= 0.6 {
            ConfidenceLevel::Moderate
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "Very High",
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Good => "Good",
            ConfidenceLevel::Moderate => "Moderate",
            ConfidenceLevel::Low => "Low",
        }
    }
}

/// Confidence as a whole percentage.
pub fn percentage(confidence: f32) -> u32 {
    (confidence.clamp(0.0, 1.0) * 100.0).round() as u32
}
