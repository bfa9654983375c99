//! Measurement pipeline.
//!
//! Stages run in a fixed order:
//!
//! 1. Validate and normalize the height
//! 2. Assess front and side images (concurrently)
//! 3. Extract landmarks from the front image, if a detector is available
//! 4. Score confidence
//! 5. Geometric measurements from landmarks
//! 6. Statistical estimates for the remaining parts
//! 7. Chest/waist cross-reference jitter
//! 8. Attach height
//! 9. Proportion refinement
//!
//! Stages 1-4 may suspend; every random draw happens afterwards, so an
//! invocation can be dropped at any await point without side effects.

use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;

use crate::confidence::{self, ConfidenceLevel, Signals};
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::geometry;
use crate::landmarks::{self, Extraction, LandmarkCapability, LandmarkDetector, NoDetector};
use crate::model::BodyModel;
use crate::quality::{self, ImageResource, ValidationMode};
use crate::refine;
use crate::types::{Gender, MeasurementSet, UnitSystem, HEIGHT_KEY};

pub const MIN_HEIGHT_CM: f32 = 100.0;
pub const MAX_HEIGHT_CM: f32 = 220.0;

/// Receiver for user-facing failure messages.
pub trait Notifier: Send + Sync {
    fn report(&self, title: &str, description: &str);
}

impl<F> Notifier for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn report(&self, title: &str, description: &str) {
        self(title, description)
    }
}

/// Notifier that writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn report(&self, title: &str, description: &str) {
        tracing::warn!(title, description, "measurement failed");
    }
}

/// Measurements with their confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub measurements: MeasurementSet,
    pub confidence: f32,
}

impl Estimate {
    pub fn level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }
}

/// Everything gathered before the first random draw.
#[derive(Debug, Clone)]
struct Observation {
    gender: Gender,
    height_cm: f32,
    confidence: f32,
    extraction: Extraction,
}

/// Parse a user-entered height and normalize it to centimeters.
///
/// Fails with [`Error::InvalidHeight`] if the value is not a number or the
/// result lies outside 100-220 cm.
pub fn parse_height(value: &str, units: UnitSystem) -> Result<f32> {
    let invalid = || Error::InvalidHeight {
        value: value.to_string(),
    };

    let raw: f32 = value.trim().parse().map_err(|_| invalid())?;
    let height_cm = units.to_centimeters(raw);

    if !height_cm.is_finite() || !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&height_cm) {
        return Err(invalid());
    }
    Ok(height_cm)
}

/// Estimates body measurements from two photos and a height.
///
/// The pipeline owns only immutable data; share it by reference and run any
/// number of invocations concurrently.
///
/// # Usage
///
/// ```ignore
/// let pipeline = MeasurementPipeline::new(BodyModel::default(), PipelineConfig::default());
/// let front = BodyImage::open("front.jpg")?;
/// let side = BodyImage::open("side.jpg")?;
/// let estimate = pipeline
///     .compute_measurements(Gender::Female, "165", UnitSystem::Metric, &front, &side)
///     .await?;
/// ```
pub struct MeasurementPipeline<D = NoDetector> {
    model: BodyModel,
    config: PipelineConfig,
    detector: LandmarkCapability<D>,
    notifier: Arc<dyn Notifier>,
}

impl MeasurementPipeline<NoDetector> {
    /// Pipeline without pose detection: statistics only.
    pub fn new(model: BodyModel, config: PipelineConfig) -> Self {
        Self {
            model,
            config,
            detector: LandmarkCapability::Unavailable,
            notifier: Arc::new(LogNotifier),
        }
    }
}

impl<D: LandmarkDetector> MeasurementPipeline<D> {
    pub fn with_detector(model: BodyModel, config: PipelineConfig, detector: D) -> Self {
        Self {
            model,
            config,
            detector: LandmarkCapability::Available(detector),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    pub fn model(&self) -> &BodyModel {
        &self.model
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_available()
    }

    /// Run one invocation using the thread-local random source.
    pub async fn compute_measurements<I>(
        &self,
        gender: Gender,
        height_value: &str,
        units: UnitSystem,
        front: &I,
        side: &I,
    ) -> Result<Estimate>
    where
        I: ImageResource + ?Sized,
    {
        let observation = self.observe(gender, height_value, units, front, side).await;
        let observation = self.reported(observation)?;
        let estimate = self.estimate(observation, &mut rand::thread_rng());
        self.reported(estimate)
    }

    /// Run one invocation drawing from `rng`, for reproducible results.
    pub async fn compute_measurements_with_rng<I, R>(
        &self,
        gender: Gender,
        height_value: &str,
        units: UnitSystem,
        front: &I,
        side: &I,
        rng: &mut R,
    ) -> Result<Estimate>
    where
        I: ImageResource + ?Sized,
        R: Rng + Send,
    {
        let observation = self.observe(gender, height_value, units, front, side).await;
        let observation = self.reported(observation)?;
        let estimate = self.estimate(observation, rng);
        self.reported(estimate)
    }

    /// Run one invocation, abandoning it as soon as `cancel` completes.
    ///
    /// A cancelled invocation returns [`Error::Cancelled`] and reports nothing.
    pub async fn compute_measurements_until<I, C>(
        &self,
        gender: Gender,
        height_value: &str,
        units: UnitSystem,
        front: &I,
        side: &I,
        cancel: C,
    ) -> Result<Estimate>
    where
        I: ImageResource + ?Sized,
        C: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::debug!("measurement cancelled by caller");
                Err(Error::Cancelled)
            }
            result = self.compute_measurements(gender, height_value, units, front, side) => result,
        }
    }

    /// Stages 1-4: everything that may suspend.
    async fn observe<I>(
        &self,
        gender: Gender,
        height_value: &str,
        units: UnitSystem,
        front: &I,
        side: &I,
    ) -> Result<Observation>
    where
        I: ImageResource + ?Sized,
    {
        let height_cm = parse_height(height_value, units)?;
        tracing::debug!(%gender, height_cm, "height accepted");

        let mode = self.config.validation;
        let (front_quality, side_quality) =
            tokio::join!(quality::assess(front, mode), quality::assess(side, mode));

        if mode == ValidationMode::Strict && !(front_quality.is_valid && side_quality.is_valid) {
            return Err(Error::ImageQualityRejected {
                front: front_quality.is_valid,
                side: side_quality.is_valid,
            });
        }

        let extraction = landmarks::extract(&self.detector, front, self.config.landmark_timeout()).await;

        let signals = match (&extraction, mode) {
            (Extraction::Detected { quality, .. }, _) => Signals::WithLandmarks {
                front: front_quality.score,
                side: side_quality.score,
                landmarks: *quality,
            },
            (Extraction::Failed, ValidationMode::Permissive) => Signals::WithLandmarks {
                front: front_quality.score,
                side: side_quality.score,
                landmarks: self.config.landmark_floor,
            },
            _ => Signals::Images {
                front: front_quality.score,
                side: side_quality.score,
            },
        };
        let confidence = confidence::score(signals);
        tracing::debug!(?signals, confidence, "confidence scored");

        Ok(Observation {
            gender,
            height_cm,
            confidence,
            extraction,
        })
    }

    /// Stages 5-9: synchronous, draws from `rng`.
    fn estimate<R: Rng>(&self, observation: Observation, rng: &mut R) -> Result<Estimate> {
        let Observation {
            gender,
            height_cm,
            confidence,
            extraction,
        } = observation;
        let landmark_quality = extraction.quality();

        let mut measurements = match extraction.landmarks() {
            Some(pose) if landmark_quality > self.config.geometric_min_quality => {
                geometry::measure(Some(pose), height_cm, gender, &self.config.geometry)
            }
            _ => MeasurementSet::new(),
        };
        let geometric_parts = measurements.len();

        let keep_geometric = landmark_quality > self.config.preserve_geometric_quality;
        self.model
            .estimate(gender, height_cm, confidence, &mut measurements, keep_geometric, rng);
        self.model.cross_reference(&mut measurements, rng);

        measurements.insert(HEIGHT_KEY, height_cm);

        refine::refine(
            &mut measurements,
            self.model.proportions(gender),
            confidence,
            self.config.refine_threshold,
        );

        if !measurements.is_well_formed() {
            return Err(Error::Processing(format!(
                "non-positive or non-finite measurement in {measurements:?}"
            )));
        }

        tracing::debug!(
            parts = measurements.len(),
            geometric_parts,
            keep_geometric,
            confidence,
            "measurements computed"
        );

        Ok(Estimate {
            measurements,
            confidence,
        })
    }

    /// Forward user-visible errors to the notifier.
    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if let Some((title, description)) = e.user_message() {
                tracing::warn!(error = %e, "measurement rejected");
                self.notifier.report(title, description);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::ImageSize;
    use crate::types::{BodyPart, Keypoint, Landmark, PoseLandmarks};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedDetector(PoseLandmarks);

    impl LandmarkDetector for FixedDetector {
        fn detect<'a, I: ImageResource + ?Sized>(
            &'a self,
            _image: &'a I,
        ) -> impl Future<Output = Result<PoseLandmarks>> + Send + 'a {
            async move { Ok(self.0.clone()) }
        }
    }

    struct StalledDetector;

    impl LandmarkDetector for StalledDetector {
        fn detect<'a, I: ImageResource + ?Sized>(
            &'a self,
            _image: &'a I,
        ) -> impl Future<Output = Result<PoseLandmarks>> + Send + 'a {
            std::future::pending()
        }
    }

    fn good_image() -> ImageSize {
        ImageSize::new(1000, 2000)
    }

    fn pose(visibility: f32) -> PoseLandmarks {
        PoseLandmarks::from_pairs([
            (Keypoint::LeftShoulder, Landmark::new(0.375, 0.20, visibility)),
            (Keypoint::RightShoulder, Landmark::new(0.625, 0.20, visibility)),
            (Keypoint::LeftHip, Landmark::new(0.45, 0.50, visibility)),
            (Keypoint::RightHip, Landmark::new(0.55, 0.50, visibility)),
            (Keypoint::LeftKnee, Landmark::new(0.45, 0.70, visibility)),
            (Keypoint::RightKnee, Landmark::new(0.55, 0.70, visibility)),
            (Keypoint::LeftAnkle, Landmark::new(0.45, 0.90, visibility)),
            (Keypoint::RightAnkle, Landmark::new(0.55, 0.90, visibility)),
        ])
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Notifier + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let notifier = move |title: &str, _description: &str| {
            sink.lock().unwrap().push(title.to_string());
        };
        (seen, notifier)
    }

    #[test]
    fn height_parsing() {
        assert_eq!(parse_height("180", UnitSystem::Metric).unwrap(), 180.0);
        assert_eq!(parse_height(" 100.0 ", UnitSystem::Metric).unwrap(), 100.0);
        assert_abs_diff_eq!(parse_height("70", UnitSystem::Imperial).unwrap(), 177.8, epsilon = 0.1);

        for bad in ["99.9", "220.5", "abc", "", "NaN", "inf"] {
            assert!(
                matches!(parse_height(bad, UnitSystem::Metric), Err(Error::InvalidHeight { .. })),
                "{bad} should be rejected"
            );
        }
        // 30 in is 76.2 cm
        assert!(parse_height("30", UnitSystem::Imperial).is_err());
    }

    #[tokio::test]
    async fn invalid_height_is_reported_once() {
        let (seen, notifier) = recorder();
        let pipeline =
            MeasurementPipeline::new(BodyModel::default(), PipelineConfig::default()).with_notifier(notifier);

        let result = pipeline
            .compute_measurements(Gender::Male, "99.9", UnitSystem::Metric, &good_image(), &good_image())
            .await;

        assert!(matches!(result, Err(Error::InvalidHeight { .. })));
        assert_eq!(*seen.lock().unwrap(), vec!["Invalid height".to_string()]);
    }

    #[tokio::test]
    async fn strict_mode_rejects_landscape_images() {
        let (seen, notifier) = recorder();
        let pipeline =
            MeasurementPipeline::new(BodyModel::default(), PipelineConfig::default()).with_notifier(notifier);

        let landscape = ImageSize::new(2000, 1000);
        let result = pipeline
            .compute_measurements(Gender::Female, "165", UnitSystem::Metric, &good_image(), &landscape)
            .await;

        assert!(matches!(
            result,
            Err(Error::ImageQualityRejected {
                front: true,
                side: false
            })
        ));
        assert_eq!(*seen.lock().unwrap(), vec!["Image processing failed".to_string()]);
    }

    #[tokio::test]
    async fn permissive_mode_accepts_landscape_images() {
        let pipeline = MeasurementPipeline::new(BodyModel::default(), PipelineConfig::permissive());
        let landscape = ImageSize::new(2000, 1000);
        let estimate = pipeline
            .compute_measurements(Gender::Female, "165", UnitSystem::Metric, &landscape, &landscape)
            .await
            .unwrap();

        // 0.6 * 0.6 + 0.6 * 0.4
        assert_abs_diff_eq!(estimate.confidence, 0.6, epsilon = 1e-5);
        assert!(estimate.measurements.is_well_formed());
    }

    #[tokio::test]
    async fn seeded_runs_are_reproducible() {
        let pipeline = MeasurementPipeline::new(BodyModel::default(), PipelineConfig::default());
        let run = |seed| {
            let pipeline = &pipeline;
            async move {
                let mut rng = StdRng::seed_from_u64(seed);
                pipeline
                    .compute_measurements_with_rng(
                        Gender::Other,
                        "172",
                        UnitSystem::Metric,
                        &good_image(),
                        &good_image(),
                        &mut rng,
                    )
                    .await
                    .unwrap()
            }
        };

        assert_eq!(run(42).await, run(42).await);
    }

    #[tokio::test]
    async fn high_quality_landmarks_keep_geometric_shoulder() {
        let pipeline =
            MeasurementPipeline::with_detector(BodyModel::default(), PipelineConfig::default(), FixedDetector(pose(0.9)));
        let estimate = pipeline
            .compute_measurements(Gender::Male, "180", UnitSystem::Metric, &good_image(), &good_image())
            .await
            .unwrap();

        // 0.9 * 0.4 + 0.9 * 0.3 + 0.9 * 0.3
        assert_abs_diff_eq!(estimate.confidence, 0.9, epsilon = 1e-5);
        // Geometric shoulder: 0.25 * 180 * 0.4, unrounded.
        assert_abs_diff_eq!(estimate.measurements.part(BodyPart::Shoulder).unwrap(), 18.0, epsilon = 1e-3);
        // Geometric inseam survives: 0.4 * 180 * 0.45
        assert_abs_diff_eq!(estimate.measurements.part(BodyPart::Inseam).unwrap(), 32.4, epsilon = 1e-3);
    }

    #[tokio::test]
    async fn middling_landmarks_are_overwritten_by_statistics() {
        let pipeline =
            MeasurementPipeline::with_detector(BodyModel::default(), PipelineConfig::default(), FixedDetector(pose(0.6)));
        let estimate = pipeline
            .compute_measurements(Gender::Male, "180", UnitSystem::Metric, &good_image(), &good_image())
            .await
            .unwrap();

        // Statistical shoulder for 180 cm is around 21 cm, not the geometric 18.
        let shoulder = estimate.measurements.part(BodyPart::Shoulder).unwrap();
        assert!(shoulder > 19.5, "shoulder {shoulder}");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_detector_times_out_to_statistics() {
        let config = PipelineConfig {
            landmark_timeout_ms: 100,
            ..PipelineConfig::default()
        };
        let pipeline = MeasurementPipeline::with_detector(BodyModel::default(), config, StalledDetector);
        let estimate = pipeline
            .compute_measurements(Gender::Female, "160", UnitSystem::Metric, &good_image(), &good_image())
            .await
            .unwrap();

        // Strict mode without landmarks falls back to the image-only formula.
        assert_abs_diff_eq!(estimate.confidence, 0.9, epsilon = 1e-5);
        for part in BodyPart::ALL {
            assert!(estimate.measurements.has_part(part));
        }
    }

    #[tokio::test]
    async fn nan_visibility_falls_back_to_image_confidence() {
        let pose = PoseLandmarks::from_pairs([
            (Keypoint::LeftShoulder, Landmark::new(0.375, 0.20, f32::NAN)),
            (Keypoint::RightShoulder, Landmark::new(0.625, 0.20, f32::NAN)),
        ]);
        let pipeline =
            MeasurementPipeline::with_detector(BodyModel::default(), PipelineConfig::default(), FixedDetector(pose));
        let estimate = pipeline
            .compute_measurements(Gender::Male, "180", UnitSystem::Metric, &good_image(), &good_image())
            .await
            .unwrap();

        assert_abs_diff_eq!(estimate.confidence, 0.9, epsilon = 1e-5);
        assert!(estimate.measurements.is_well_formed());
    }

    #[tokio::test(start_paused = true)]
    async fn permissive_failure_uses_landmark_floor() {
        let config = PipelineConfig {
            landmark_timeout_ms: 100,
            ..PipelineConfig::permissive()
        };
        let pipeline = MeasurementPipeline::with_detector(BodyModel::default(), config, StalledDetector);
        let estimate = pipeline
            .compute_measurements(Gender::Female, "160", UnitSystem::Metric, &good_image(), &good_image())
            .await
            .unwrap();

        // 0.9 * 0.4 + 0.9 * 0.3 + 0.6 * 0.3
        assert_abs_diff_eq!(estimate.confidence, 0.81, epsilon = 1e-5);
    }

    #[tokio::test]
    async fn cancellation_reports_nothing() {
        let (seen, notifier) = recorder();
        let pipeline = MeasurementPipeline::with_detector(
            BodyModel::default(),
            PipelineConfig::default(),
            StalledDetector,
        )
        .with_notifier(notifier);

        let (cancel_tx, cancel_rx) = tokio::sync::oneshot::channel::<()>();
        let cancel = async move {
            let _ = cancel_rx.await;
        };
        cancel_tx.send(()).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            pipeline.compute_measurements_until(
                Gender::Male,
                "180",
                UnitSystem::Metric,
                &good_image(),
                &good_image(),
                cancel,
            ),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn custom_model_with_bad_output_is_a_processing_error() {
        use crate::model::{BodyModelBuilder, Coefficients};

        let model = BodyModelBuilder::new()
            .coefficients(Gender::Male, BodyPart::Neck, Coefficients::new(-80.0, 0.0, 0.0, 0.0))
            .build()
            .unwrap();
        let (seen, notifier) = recorder();
        let pipeline = MeasurementPipeline::new(model, PipelineConfig::default()).with_notifier(notifier);

        let result = pipeline
            .compute_measurements(Gender::Male, "180", UnitSystem::Metric, &good_image(), &good_image())
            .await;

        assert!(matches!(result, Err(Error::Processing(_))));
        assert_eq!(*seen.lock().unwrap(), vec!["Processing error".to_string()]);
    }
}
