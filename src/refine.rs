//! Proportion-based refinement.
//!
//! Once confidence is high enough, waist and hips are reconciled against
//! chest through fixed anthropometric ratios, and gaps are filled from the
//! ratios that relate a missing part to a present one.

use crate::model::Proportions;
use crate::types::{BodyPart, MeasurementSet, HEIGHT_KEY};

/// Weight kept by the measured value when blending with a ratio estimate.
pub const BLEND_WEIGHT: f32 = 0.7;

pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Refine `measurements` in place. No-op unless `confidence > threshold`.
pub fn refine(measurements: &mut MeasurementSet, proportions: &Proportions, confidence: f32, threshold: f32) {
    if confidence.is_nan() || confidence <= threshold {
        return;
    }

    relate(measurements, BodyPart::Waist, proportions.chest_to_waist);
    relate(measurements, BodyPart::Hips, proportions.chest_to_hip);

    fill_from(measurements, BodyPart::Neck, BodyPart::Chest.as_str(), proportions.chest_to_neck);
    fill_from(measurements, BodyPart::Inseam, HEIGHT_KEY, proportions.height_to_inseam);
    fill_from(measurements, BodyPart::Sleeve, BodyPart::Shoulder.as_str(), proportions.shoulder_to_sleeve);
}

/// Reconcile `part` with chest through `chest * ratio`.
fn relate(measurements: &mut MeasurementSet, part: BodyPart, ratio: f32) {
    let chest = measurements.part(BodyPart::Chest);
    let other = measurements.part(part);

    match (chest, other) {
        (Some(chest), Some(value)) => {
            let blended = value * BLEND_WEIGHT + chest * ratio * (1.0 - BLEND_WEIGHT);
            measurements.set_part(part, blended);
        }
        (Some(chest), None) => measurements.set_part(part, chest * ratio),
        (None, Some(value)) => measurements.set_part(BodyPart::Chest, value / ratio),
        (None, None) => {}
    }
}

/// Set `part` to `source * ratio` only when `part` is absent.
fn fill_from(measurements: &mut MeasurementSet, part: BodyPart, source: &str, ratio: f32) {
    if measurements.has_part(part) {
        return;
    }
    if let Some(value) = measurements.get(source) {
        measurements.set_part(part, value * ratio);
    }
}
