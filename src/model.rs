use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bzip2::read::BzDecoder;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{round_tenth, BodyPart, Gender, MeasurementSet};

/// Regression coefficients for one body part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub base: f32,
    pub height_multiplier: f32,
    pub weight_impact: f32,
    /// How strongly low confidence shrinks this part.
    pub proportion_factor: f32,
}

impl Coefficients {
    pub const fn new(base: f32, height_multiplier: f32, weight_impact: f32, proportion_factor: f32) -> Self {
        Self {
            base,
            height_multiplier,
            weight_impact,
            proportion_factor,
        }
    }

    /// Measurement before variation and confidence adjustment.
    pub fn raw(&self, height_cm: f32, weight_kg: f32) -> f32 {
        self.base + height_cm * self.height_multiplier / 100.0 + weight_kg.sqrt() * self.weight_impact
    }

    /// Multiplier in (0, 1] that grows more conservative as confidence drops.
    pub fn confidence_adjustment(&self, confidence: f32) -> f32 {
        1.0 - (1.0 - confidence) * self.proportion_factor * 2.0
    }
}

/// Anthropometric ratios used for cross-refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proportions {
    pub chest_to_waist: f32,
    pub chest_to_hip: f32,
    pub chest_to_neck: f32,
    pub height_to_inseam: f32,
    pub shoulder_to_sleeve: f32,
}

/// One value per gender variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenderTable<T> {
    pub male: T,
    pub female: T,
    pub other: T,
}

impl<T> GenderTable<T> {
    pub fn get(&self, gender: Gender) -> &T {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Other => &self.other,
        }
    }
}

pub type PartTable = BTreeMap<BodyPart, Coefficients>;

/// The statistical body model.
///
/// Holds per-gender coefficient and proportion tables plus the randomization
/// bounds. Immutable once built; share it by reference across invocations.
///
/// # Usage
///
/// ```ignore
/// let model = BodyModel::default();
/// let mut set = MeasurementSet::new();
/// model.estimate(Gender::Female, 165.0, 0.9, &mut set, false, &mut rand::thread_rng());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyModel {
    coefficients: GenderTable<PartTable>,
    proportions: GenderTable<Proportions>,

    /// BMI assumed when deriving weight from height.
    reference_bmi: f32,

    /// Half-width of the individual variation multiplier (0.03 = +/-3%).
    individual_variation: f32,

    /// Half-width of the chest/waist cross-reference jitter.
    cross_reference_jitter: f32,
}

impl BodyModel {
    /// Load a model from a bincode file, decompressing `.bz2` files.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);

        let is_bz2 = path.extension().is_some_and(|ext| ext == "bz2");
        if is_bz2 {
            Self::from_reader(BzDecoder::new(reader))
        } else {
            Self::from_reader(reader)
        }
    }

    /// Load a model from an already-opened reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        model.validate()?;
        Ok(model)
    }

    /// Save the model to a bincode file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn coefficients(&self, gender: Gender) -> &PartTable {
        self.coefficients.get(gender)
    }

    pub fn proportions(&self, gender: Gender) -> &Proportions {
        self.proportions.get(gender)
    }

    pub fn reference_bmi(&self) -> f32 {
        self.reference_bmi
    }

    /// Weight proxy in kg from height at the reference BMI.
    pub fn estimated_weight(&self, height_cm: f32) -> f32 {
        let meters = height_cm / 100.0;
        self.reference_bmi * meters * meters
    }

    /// Fill `measurements` with statistical estimates for every tracked part.
    ///
    /// When `keep_existing` is set, parts already present (from landmark
    /// geometry) are left alone; otherwise they are overwritten. Each computed
    /// value is rounded to one decimal.
    pub fn estimate<R: Rng>(
        &self,
        gender: Gender,
        height_cm: f32,
        confidence: f32,
        measurements: &mut MeasurementSet,
        keep_existing: bool,
        rng: &mut R,
    ) {
        let weight = self.estimated_weight(height_cm);
        let spread = self.individual_variation;

        for (&part, coeffs) in self.coefficients(gender) {
            if keep_existing && measurements.has_part(part) {
                continue;
            }

            let variation = 1.0 + rng.gen_range(-spread..=spread);
            let value = coeffs.raw(height_cm, weight) * variation * coeffs.confidence_adjustment(confidence);

            measurements.set_part(part, round_tenth(value));
        }
    }

    /// Apply one independent jitter to chest and waist, whatever their source.
    pub fn cross_reference<R: Rng>(&self, measurements: &mut MeasurementSet, rng: &mut R) {
        let spread = self.cross_reference_jitter;
        for part in [BodyPart::Chest, BodyPart::Waist] {
            if let Some(value) = measurements.part(part) {
                let jitter = 1.0 + rng.gen_range(-spread..=spread);
                measurements.set_part(part, round_tenth(value * jitter));
            }
        }
    }

    /// Check that every gender has coefficients for every tracked part and
    /// that the numeric parameters are usable.
    pub fn validate(&self) -> Result<()> {
        for gender in Gender::ALL {
            let table = self.coefficients(gender);
            for part in BodyPart::ALL {
                let Some(c) = table.get(&part) else {
                    return Err(Error::InvalidModel(format!(
                        "missing coefficients for {gender} {part}"
                    )));
                };
                let finite = [c.base, c.height_multiplier, c.weight_impact, c.proportion_factor]
                    .iter()
                    .all(|v| v.is_finite());
                if !finite || !(0.0..0.5).contains(&c.proportion_factor) {
                    return Err(Error::InvalidModel(format!(
                        "bad coefficients for {gender} {part}: {c:?}"
                    )));
                }
            }

            let p = self.proportions(gender);
            let ratios = [
                p.chest_to_waist,
                p.chest_to_hip,
                p.chest_to_neck,
                p.height_to_inseam,
                p.shoulder_to_sleeve,
            ];
            if !ratios.iter().all(|r| r.is_finite() && *r > 0.0) {
                return Err(Error::InvalidModel(format!("bad proportions for {gender}: {p:?}")));
            }
        }

        if !(self.reference_bmi.is_finite() && self.reference_bmi > 0.0) {
            return Err(Error::InvalidModel(format!(
                "reference BMI must be positive, got {}",
                self.reference_bmi
            )));
        }
        for (name, spread) in [
            ("individual variation", self.individual_variation),
            ("cross-reference jitter", self.cross_reference_jitter),
        ] {
            if !(0.0..0.5).contains(&spread) {
                return Err(Error::InvalidModel(format!("{name} out of range: {spread}")));
            }
        }
        Ok(())
    }
}

impl Default for BodyModel {
    fn default() -> Self {
        Self {
            coefficients: default_coefficients(),
            proportions: default_proportions(),
            reference_bmi: 22.0,
            individual_variation: 0.03,
            cross_reference_jitter: 0.02,
        }
    }
}

/// Builder for alternate model tables.
pub struct BodyModelBuilder {
    coefficients: GenderTable<PartTable>,
    proportions: GenderTable<Proportions>,
    reference_bmi: f32,
    individual_variation: f32,
    cross_reference_jitter: f32,
}

impl BodyModelBuilder {
    /// Start from the built-in tables.
    pub fn new() -> Self {
        let BodyModel {
            coefficients,
            proportions,
            reference_bmi,
            individual_variation,
            cross_reference_jitter,
        } = BodyModel::default();
        Self {
            coefficients,
            proportions,
            reference_bmi,
            individual_variation,
            cross_reference_jitter,
        }
    }

    /// Replace the coefficients of one part.
    pub fn coefficients(mut self, gender: Gender, part: BodyPart, coeffs: Coefficients) -> Self {
        let table = match gender {
            Gender::Male => &mut self.coefficients.male,
            Gender::Female => &mut self.coefficients.female,
            Gender::Other => &mut self.coefficients.other,
        };
        table.insert(part, coeffs);
        self
    }

    pub fn proportions(mut self, gender: Gender, proportions: Proportions) -> Self {
        match gender {
            Gender::Male => self.proportions.male = proportions,
            Gender::Female => self.proportions.female = proportions,
            Gender::Other => self.proportions.other = proportions,
        }
        self
    }

    pub fn reference_bmi(mut self, bmi: f32) -> Self {
        self.reference_bmi = bmi;
        self
    }

    /// Set the individual variation half-width; 0 disables it.
    pub fn individual_variation(mut self, spread: f32) -> Self {
        self.individual_variation = spread;
        self
    }

    /// Set the cross-reference jitter half-width; 0 disables it.
    pub fn cross_reference_jitter(mut self, spread: f32) -> Self {
        self.cross_reference_jitter = spread;
        self
    }

    pub fn build(self) -> Result<BodyModel> {
        let model = BodyModel {
            coefficients: self.coefficients,
            proportions: self.proportions,
            reference_bmi: self.reference_bmi,
            individual_variation: self.individual_variation,
            cross_reference_jitter: self.cross_reference_jitter,
        };
        model.validate()?;
        Ok(model)
    }
}

impl Default for BodyModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn part_table(rows: [(BodyPart, [f32; 4]); 8]) -> PartTable {
    rows.into_iter()
        .map(|(part, [b, h, w, p])| (part, Coefficients::new(b, h, w, p)))
        .collect()
}

/// Built-in coefficient tables as (base, height multiplier, weight impact,
/// proportion factor).
pub fn default_coefficients() -> GenderTable<PartTable> {
    use BodyPart::*;
    GenderTable {
        male: part_table([
            (Chest, [36.5, 0.52, 1.2, 0.05]),
            (Waist, [31.8, 0.45, 1.0, 0.03]),
            (Hips, [35.7, 0.51, 0.9, 0.02]),
            (Inseam, [30.2, 0.48, 0.3, 0.01]),
            (Shoulder, [16.4, 0.23, 0.5, 0.04]),
            (Sleeve, [24.1, 0.33, 0.2, 0.03]),
            (Neck, [14.8, 0.19, 0.4, 0.02]),
            (Thigh, [20.3, 0.29, 0.6, 0.03]),
        ]),
        female: part_table([
            (Chest, [33.8, 0.51, 0.9, 0.06]),
            (Waist, [28.4, 0.41, 0.8, 0.04]),
            (Hips, [37.6, 0.55, 1.0, 0.05]),
            (Inseam, [28.9, 0.47, 0.2, 0.01]),
            (Shoulder, [14.7, 0.21, 0.4, 0.03]),
            (Sleeve, [21.8, 0.30, 0.15, 0.02]),
            (Neck, [12.6, 0.16, 0.25, 0.01]),
            (Thigh, [21.5, 0.31, 0.5, 0.04]),
        ]),
        other: part_table([
            (Chest, [35.1, 0.515, 1.05, 0.055]),
            (Waist, [30.1, 0.43, 0.9, 0.035]),
            (Hips, [36.6, 0.53, 0.95, 0.035]),
            (Inseam, [29.5, 0.475, 0.25, 0.01]),
            (Shoulder, [15.5, 0.22, 0.45, 0.035]),
            (Sleeve, [22.9, 0.315, 0.175, 0.025]),
            (Neck, [13.7, 0.175, 0.325, 0.015]),
            (Thigh, [20.9, 0.30, 0.55, 0.035]),
        ]),
    }
}

/// Built-in proportion tables. Ratios match what the coefficient tables
/// produce at a typical height for each variant.
pub fn default_proportions() -> GenderTable<Proportions> {
    GenderTable {
        male: Proportions {
            chest_to_waist: 0.86,
            chest_to_hip: 0.93,
            chest_to_neck: 0.39,
            height_to_inseam: 0.45,
            shoulder_to_sleeve: 1.25,
        },
        female: Proportions {
            chest_to_waist: 0.85,
            chest_to_hip: 1.11,
            chest_to_neck: 0.36,
            height_to_inseam: 0.44,
            shoulder_to_sleeve: 1.30,
        },
        other: Proportions {
            chest_to_waist: 0.855,
            chest_to_hip: 1.02,
            chest_to_neck: 0.375,
            height_to_inseam: 0.445,
            shoulder_to_sleeve: 1.275,
        },
    }
}
