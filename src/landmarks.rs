//! Pose landmark extraction contract.
//!
//! Pose estimation itself lives outside this crate. A detector is plugged in
//! through [`LandmarkDetector`]; the pipeline only needs a normalized
//! [`PoseLandmarks`] back, and treats every failure (error, empty pose,
//! timeout) as "no landmarks available".

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::quality::ImageResource;
use crate::types::{Keypoint, PoseLandmarks};

/// Keypoints whose mean visibility defines landmark quality.
pub const QUALITY_KEYPOINTS: [Keypoint; 6] = [
    Keypoint::LeftShoulder,
    Keypoint::RightShoulder,
    Keypoint::LeftHip,
    Keypoint::RightHip,
    Keypoint::LeftKnee,
    Keypoint::RightKnee,
];

/// An external pose detector.
///
/// Implementations return coordinates normalized to [0,1] in both axes.
pub trait LandmarkDetector: Send + Sync {
    fn detect<'a, I: ImageResource + ?Sized>(
        &'a self,
        image: &'a I,
    ) -> impl Future<Output = Result<PoseLandmarks>> + Send + 'a;
}

/// Placeholder detector for pipelines built without pose support. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

impl LandmarkDetector for NoDetector {
    fn detect<'a, I: ImageResource + ?Sized>(
        &'a self,
        _image: &'a I,
    ) -> impl Future<Output = Result<PoseLandmarks>> + Send + 'a {
        std::future::ready(Err(Error::LandmarkExtractionFailed(
            "no landmark detector configured".into(),
        )))
    }
}

/// Whether pose detection can be attempted at all.
#[derive(Debug, Clone)]
pub enum LandmarkCapability<D> {
    Available(D),
    Unavailable,
}

impl<D> LandmarkCapability<D> {
    pub fn is_available(&self) -> bool {
        matches!(self, LandmarkCapability::Available(_))
    }
}

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No detector configured.
    Unavailable,
    /// The detector ran but produced nothing usable.
    Failed,
    Detected {
        landmarks: PoseLandmarks,
        quality: f32,
    },
}

impl Extraction {
    pub fn landmarks(&self) -> Option<&PoseLandmarks> {
        match self {
            Extraction::Detected { landmarks, .. } => Some(landmarks),
            _ => None,
        }
    }

    /// Landmark quality, 0 when nothing was detected.
    pub fn quality(&self) -> f32 {
        match self {
            Extraction::Detected { quality, .. } => *quality,
            _ => 0.0,
        }
    }
}

/// Mean visibility over [`QUALITY_KEYPOINTS`]; missing keypoints count as 0.
pub fn landmark_quality(landmarks: &PoseLandmarks) -> f32 {
    let total: f32 = QUALITY_KEYPOINTS
        .iter()
        .map(|&kp| landmarks.get(kp).map_or(0.0, |lm| lm.visibility))
        .sum();
    total / QUALITY_KEYPOINTS.len() as f32
}

/// Run the detector on `image`, bounded by `timeout`.
///
/// Never returns an error: detector errors, timeouts and poses with no
/// finite keypoints all come back as [`Extraction::Failed`].
pub async fn extract<D, I>(
    capability: &LandmarkCapability<D>,
    image: &I,
    timeout: Duration,
) -> Extraction
where
    D: LandmarkDetector,
    I: ImageResource + ?Sized,
{
    let LandmarkCapability::Available(detector) = capability else {
        return Extraction::Unavailable;
    };

    let attempt = match tokio::time::timeout(timeout, detector.detect(image)).await {
        Ok(Ok(landmarks)) => sanitize(landmarks),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::LandmarkExtractionFailed(format!(
            "timed out after {} ms",
            timeout.as_millis()
        ))),
    };

    let attempt = attempt.and_then(|landmarks| {
        let quality = landmark_quality(&landmarks);
        if quality.is_finite() {
            Ok((landmarks, quality))
        } else {
            Err(Error::LandmarkExtractionFailed(format!("landmark quality is {quality}")))
        }
    });

    match attempt {
        Ok((landmarks, quality)) => {
            tracing::debug!(
                keypoints = landmarks.num_present(),
                quality,
                "landmarks extracted"
            );
            Extraction::Detected { landmarks, quality }
        }
        Err(e) => {
            tracing::debug!(error = %e, "landmark extraction degraded to statistics only");
            Extraction::Failed
        }
    }
}

/// Drop keypoints with non-finite position or visibility. Fails if none remain.
fn sanitize(mut landmarks: PoseLandmarks) -> Result<PoseLandmarks> {
    let before = landmarks.num_present();
    for slot in &mut landmarks.points {
        if slot.is_some_and(|lm| !lm.is_finite()) {
            *slot = None;
        }
    }

    let dropped = before - landmarks.num_present();
    if dropped > 0 {
        tracing::debug!(dropped, "discarded non-finite keypoints");
    }

    if landmarks.is_empty() {
        return Err(Error::LandmarkExtractionFailed("no keypoints detected".into()));
    }
    Ok(landmarks)
}
