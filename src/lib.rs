//! # percent-body
//!
//! Body measurement estimation from two photos and a known height.
//!
//! This crate provides:
//! - **Image Quality**: Dimension-based scoring of front and side photos
//! - **Landmarks**: A pluggable pose detector contract with timeout and fallback
//! - **Geometry**: Shoulder, hip, inseam and sleeve lengths from pose landmarks
//! - **Statistics**: Per-gender regression tables that fill every body part
//! - **Refinement**: Proportion-based reconciliation of waist and hips with chest
//!
//! ## Algorithm Overview
//!
//! 1. Validate the height and normalize it to centimeters
//! 2. Score both images; strict mode rejects undersized or landscape photos
//! 3. Extract landmarks from the front photo if a detector is configured
//! 4. Combine image and landmark quality into a confidence in [0, 0.98]
//! 5. Measure what the landmarks allow, estimate the rest statistically
//! 6. At high confidence, refine the set through anthropometric ratios
//!
//! Pose detection is optional. Without a detector the pipeline runs on
//! statistics alone and still returns a complete measurement set.
//!
//! ## Quick Start
//!
//! ```rust
//! use percent_body::{
//!     BodyModel, Gender, ImageSize, MeasurementPipeline, PipelineConfig, UnitSystem,
//! };
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let pipeline = MeasurementPipeline::new(BodyModel::default(), PipelineConfig::default());
//!
//! // Any ImageResource works; BodyImage wraps encoded bytes.
//! let front = ImageSize::new(1000, 2000);
//! let side = ImageSize::new(1000, 2000);
//!
//! let estimate = pipeline
//!     .compute_measurements(Gender::Female, "165", UnitSystem::Metric, &front, &side)
//!     .await
//!     .unwrap();
//!
//! println!("{}", percent_body::report::to_text(&estimate.measurements));
//! # });
//! # }
//! ```
//!
//! ## Custom Detectors
//!
//! Implement [`LandmarkDetector`] to plug in a pose estimator and build the
//! pipeline with [`MeasurementPipeline::with_detector`]. Coordinates must be
//! normalized to [0, 1].

pub mod confidence;
pub mod config;
mod error;
pub mod geometry;
pub mod landmarks;
mod model;
mod pipeline;
pub mod quality;
pub mod refine;
pub mod report;
mod types;

pub use confidence::ConfidenceLevel;
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use landmarks::{LandmarkCapability, LandmarkDetector, NoDetector};
pub use model::{
    default_coefficients, default_proportions, BodyModel, BodyModelBuilder, Coefficients,
    GenderTable, PartTable, Proportions,
};
pub use pipeline::{parse_height, Estimate, LogNotifier, MeasurementPipeline, Notifier};
pub use quality::{BodyImage, ImageQuality, ImageResource, ImageSize, ValidationMode};
pub use types::{
    round_tenth, BodyPart, Gender, Keypoint, Landmark, MeasurementSet, Point, PoseLandmarks,
    UnitSystem, CM_PER_INCH, HEIGHT_KEY,
};
