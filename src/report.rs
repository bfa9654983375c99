//! Display formatting for measurement sets.

use std::fmt::Write;

use crate::confidence::{self, ConfidenceLevel};
use crate::types::{BodyPart, MeasurementSet, UnitSystem, CM_PER_INCH, HEIGHT_KEY};

/// Parts shown first, in this order.
pub const PRIMARY_PARTS: [BodyPart; 6] = [
    BodyPart::Chest,
    BodyPart::Waist,
    BodyPart::Hips,
    BodyPart::Shoulder,
    BodyPart::Inseam,
    BodyPart::Sleeve,
];

pub const ADDITIONAL_PARTS: [BodyPart; 2] = [BodyPart::Neck, BodyPart::Thigh];

/// Human-readable name for a measurement key. Unknown keys display as-is.
pub fn display_name(key: &str) -> &str {
    match key {
        "chest" => "Chest",
        "waist" => "Waist",
        "hips" => "Hips",
        "inseam" => "Inseam",
        "shoulder" => "Shoulder Width",
        "sleeve" => "Sleeve Length",
        "neck" => "Neck",
        "thigh" => "Thigh",
        HEIGHT_KEY => "Height",
        other => other,
    }
}

/// Format a length: `47.6 cm` or `18.75"` (nearest quarter inch).
pub fn format_length(cm: f32, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{cm:.1} cm"),
        UnitSystem::Imperial => {
            let quarters = (cm / CM_PER_INCH * 4.0).round();
            format!("{:.2}\"", quarters / 4.0)
        }
    }
}

/// Format a height: `180.0 cm` or `5'11"`.
pub fn format_height(cm: f32, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{cm:.1} cm"),
        UnitSystem::Imperial => {
            let total = (cm / CM_PER_INCH).round().max(0.0) as u32;
            format!("{}'{}\"", total / 12, total % 12)
        }
    }
}

/// Entries in display order: primary parts, additional parts, then any
/// remaining keys alphabetically.
pub fn ordered(measurements: &MeasurementSet) -> Vec<(&str, f32)> {
    let known: Vec<&str> = PRIMARY_PARTS
        .iter()
        .chain(ADDITIONAL_PARTS.iter())
        .map(|p| p.as_str())
        .collect();

    let mut entries: Vec<(&str, f32)> = known
        .iter()
        .filter_map(|&key| measurements.get(key).map(|v| (key, v)))
        .collect();

    // BTreeMap iteration is already alphabetical.
    entries.extend(measurements.iter().filter(|(key, _)| !known.contains(key)));
    entries
}

/// Plain-text export, one `<Name>: <value> cm` line per entry.
pub fn to_text(measurements: &MeasurementSet) -> String {
    let mut out = String::new();
    for (key, value) in ordered(measurements) {
        let _ = writeln!(out, "{}: {value:.1} cm", display_name(key));
    }
    out
}

/// Full report with confidence header, lengths shown in `units`.
pub fn summary(measurements: &MeasurementSet, confidence: f32, units: UnitSystem) -> String {
    let mut out = String::new();
    let level = ConfidenceLevel::from_score(confidence);
    let _ = writeln!(
        out,
        "Confidence: {}% ({})",
        confidence::percentage(confidence),
        level.label()
    );

    if let Some(height) = measurements.get(HEIGHT_KEY) {
        let _ = writeln!(out, "Height: {}", format_height(height, units));
    }

    out.push_str("\nMeasurements:\n");
    let width = ordered(measurements)
        .iter()
        .map(|(key, _)| display_name(key).len())
        .max()
        .unwrap_or(0);
    for (key, value) in ordered(measurements) {
        if key == HEIGHT_KEY {
            continue;
        }
        let _ = writeln!(
            out,
            "  {:<width$}  {}",
            display_name(key),
            format_length(value, units)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MeasurementSet {
        let mut set = MeasurementSet::new();
        set.set_part(BodyPart::Thigh, 55.2);
        set.set_part(BodyPart::Neck, 38.0);
        set.set_part(BodyPart::Sleeve, 60.1);
        set.set_part(BodyPart::Chest, 96.44);
        set.set_part(BodyPart::Waist, 82.0);
        set.insert(HEIGHT_KEY, 180.0);
        set.insert("arm_span", 181.0);
        set
    }

    #[test]
    fn metric_lengths() {
        assert_eq!(format_length(47.63, UnitSystem::Metric), "47.6 cm");
        assert_eq!(format_height(177.8, UnitSystem::Metric), "177.8 cm");
    }

    #[test]
    fn imperial_lengths_round_to_quarter_inch() {
        // 47.6 cm is 18.74 in
        assert_eq!(format_length(47.6, UnitSystem::Imperial), "18.75\"");
        assert_eq!(format_length(2.54 * 10.0, UnitSystem::Imperial), "10.00\"");
    }

    #[test]
    fn imperial_height_carries_into_feet() {
        assert_eq!(format_height(177.8, UnitSystem::Imperial), "5'10\"");
        assert_eq!(format_height(180.3, UnitSystem::Imperial), "5'11\"");
        // 71.7 in rounds up to a full 6 ft
        assert_eq!(format_height(182.1, UnitSystem::Imperial), "6'0\"");
    }

    #[test]
    fn names() {
        assert_eq!(display_name("shoulder"), "Shoulder Width");
        assert_eq!(display_name("sleeve"), "Sleeve Length");
        assert_eq!(display_name("height"), "Height");
        assert_eq!(display_name("arm_span"), "arm_span");
    }

    #[test]
    fn text_export_order() {
        let text = to_text(&sample());
        let names: Vec<&str> = text.lines().map(|l| l.split(':').next().unwrap()).collect();
        assert_eq!(
            names,
            ["Chest", "Waist", "Sleeve Length", "Neck", "Thigh", "arm_span", "Height"]
        );
        assert!(text.starts_with("Chest: 96.4 cm\n"));
    }

    #[test]
    fn summary_header() {
        let report = summary(&sample(), 0.856, UnitSystem::Metric);
        assert!(report.starts_with("Confidence: 86% (High)\nHeight: 180.0 cm\n"));
        assert!(report.contains("Sleeve Length"));
        assert_eq!(report.matches("Height").count(), 1);
    }
}
