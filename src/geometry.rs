//! Body measurements from pose landmarks.
//!
//! Landmark coordinates are normalized to the image, so a distance between
//! two keypoints is a fraction of the frame. Multiplying by the known height
//! and a per-measurement scale constant gives centimeters.

use serde::{Deserialize, Serialize};

use crate::types::{BodyPart, Gender, Keypoint, MeasurementSet, PoseLandmarks};

/// Scale constants for converting landmark distances into centimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryScales {
    /// Shoulder-to-shoulder distance scale.
    pub shoulder: f32,
    /// Hip-joint-to-hip-joint distance scale.
    pub hip: f32,
    /// Hip-to-ankle distance scale.
    pub inseam: f32,
    /// Shoulder-elbow-wrist path scale.
    pub sleeve: f32,
}

impl Default for GeometryScales {
    fn default() -> Self {
        Self {
            shoulder: 0.4,
            hip: 0.5,
            inseam: 0.45,
            sleeve: 0.5,
        }
    }
}

/// Multiplier from shoulder width to chest circumference.
pub fn chest_multiplier(gender: Gender) -> f32 {
    match gender {
        Gender::Male => 2.3,
        Gender::Female => 2.1,
        Gender::Other => 2.2,
    }
}

/// Multiplier from hip width to hip circumference.
pub fn hip_multiplier(gender: Gender) -> f32 {
    match gender {
        Gender::Male => 2.1,
        Gender::Female => 2.3,
        Gender::Other => 2.2,
    }
}

/// Linear measurements (in cm) derived from a pose.
///
/// Each field is `None` when the keypoints it needs are missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyGeometry {
    pub shoulder_width: Option<f32>,
    pub hip_width: Option<f32>,
    pub inseam: Option<f32>,
    pub sleeve: Option<f32>,
}

impl BodyGeometry {
    pub fn from_landmarks(landmarks: &PoseLandmarks, height_cm: f32, scales: &GeometryScales) -> Self {
        let scaled = |d: f32, scale: f32| d * height_cm * scale;

        let shoulder_width = landmarks
            .distance(Keypoint::LeftShoulder, Keypoint::RightShoulder)
            .map(|d| scaled(d, scales.shoulder));

        let hip_width = landmarks
            .distance(Keypoint::LeftHip, Keypoint::RightHip)
            .map(|d| scaled(d, scales.hip));

        let inseam = mean_of_sides(
            landmarks.distance(Keypoint::LeftHip, Keypoint::LeftAnkle),
            landmarks.distance(Keypoint::RightHip, Keypoint::RightAnkle),
        )
        .map(|d| scaled(d, scales.inseam));

        let sleeve = mean_of_sides(
            arm_length(landmarks, Keypoint::LeftShoulder, Keypoint::LeftElbow, Keypoint::LeftWrist),
            arm_length(landmarks, Keypoint::RightShoulder, Keypoint::RightElbow, Keypoint::RightWrist),
        )
        .map(|d| scaled(d, scales.sleeve));

        Self {
            shoulder_width,
            hip_width,
            inseam,
            sleeve,
        }
    }

    /// Chest circumference estimated from shoulder width.
    pub fn chest(&self, gender: Gender) -> Option<f32> {
        self.shoulder_width.map(|w| w * chest_multiplier(gender))
    }

    /// Hip circumference estimated from hip width.
    pub fn hips(&self, gender: Gender) -> Option<f32> {
        self.hip_width.map(|w| w * hip_multiplier(gender))
    }

    /// Measurement set with the parts this geometry can supply.
    ///
    /// Degenerate values (zero length, NaN) are dropped so callers can fill
    /// the gaps from another source.
    pub fn to_measurements(&self, gender: Gender) -> MeasurementSet {
        let mut set = MeasurementSet::new();
        let candidates = [
            (BodyPart::Shoulder, self.shoulder_width),
            (BodyPart::Chest, self.chest(gender)),
            (BodyPart::Hips, self.hips(gender)),
            (BodyPart::Inseam, self.inseam),
            (BodyPart::Sleeve, self.sleeve),
        ];
        for (part, value) in candidates {
            if let Some(v) = value.filter(|v| v.is_finite() && *v > 0.0) {
                set.set_part(part, v);
            }
        }
        set
    }
}

/// Compute geometric measurements for an optional pose.
///
/// Returns an empty set when no landmarks are available.
pub fn measure(
    landmarks: Option<&PoseLandmarks>,
    height_cm: f32,
    gender: Gender,
    scales: &GeometryScales,
) -> MeasurementSet {
    match landmarks {
        Some(lm) => BodyGeometry::from_landmarks(lm, height_cm, scales).to_measurements(gender),
        None => MeasurementSet::new(),
    }
}

fn arm_length(
    landmarks: &PoseLandmarks,
    shoulder: Keypoint,
    elbow: Keypoint,
    wrist: Keypoint,
) -> Option<f32> {
    let upper = landmarks.distance(shoulder, elbow)?;
    let lower = landmarks.distance(elbow, wrist)?;
    Some(upper + lower)
}

/// Average of the two sides, or whichever side is present.
fn mean_of_sides(left: Option<f32>, right: Option<f32>) -> Option<f32> {
    match (left, right) {
        (Some(l), Some(r)) => Some((l + r) / 2.0),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}
