use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Centimeters per inch.
pub const CM_PER_INCH: f32 = 2.54;

/// A 2D point in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A detected keypoint: normalized position plus visibility in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub point: Point,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            point: Point::new(x, y),
            visibility: visibility.clamp(0.0, 1.0),
        }
    }

    /// True when position and visibility are all finite numbers.
    pub fn is_finite(&self) -> bool {
        self.point.x.is_finite() && self.point.y.is_finite() && self.visibility.is_finite()
    }
}

/// Skeletal keypoints in the COCO 17-point ordering used by most pose models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keypoint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Keypoint {
    pub const COUNT: usize = 17;

    pub const ALL: [Keypoint; Self::COUNT] = [
        Keypoint::Nose,
        Keypoint::LeftEye,
        Keypoint::RightEye,
        Keypoint::LeftEar,
        Keypoint::RightEar,
        Keypoint::LeftShoulder,
        Keypoint::RightShoulder,
        Keypoint::LeftElbow,
        Keypoint::RightElbow,
        Keypoint::LeftWrist,
        Keypoint::RightWrist,
        Keypoint::LeftHip,
        Keypoint::RightHip,
        Keypoint::LeftKnee,
        Keypoint::RightKnee,
        Keypoint::LeftAnkle,
        Keypoint::RightAnkle,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A pose represented as an indexed collection of optional landmarks.
///
/// Slots for keypoints the detector did not report are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarks {
    pub points: Vec<Option<Landmark>>,
}

impl PoseLandmarks {
    pub fn new() -> Self {
        Self {
            points: vec![None; Keypoint::COUNT],
        }
    }

    /// Build a pose from `(keypoint, landmark)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Keypoint, Landmark)>,
    {
        let mut pose = Self::new();
        for (kp, lm) in pairs {
            pose.set(kp, lm);
        }
        pose
    }

    pub fn set(&mut self, keypoint: Keypoint, landmark: Landmark) {
        if self.points.len() < Keypoint::COUNT {
            self.points.resize(Keypoint::COUNT, None);
        }
        self.points[keypoint.index()] = Some(landmark);
    }

    pub fn get(&self, keypoint: Keypoint) -> Option<&Landmark> {
        self.points.get(keypoint.index()).and_then(Option::as_ref)
    }

    pub fn num_present(&self) -> usize {
        self.points.iter().filter(|p| p.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.num_present() == 0
    }

    /// Neck position approximated as the midpoint between the shoulders.
    pub fn neck(&self) -> Option<Landmark> {
        let left = self.get(Keypoint::LeftShoulder)?;
        let right = self.get(Keypoint::RightShoulder)?;
        Some(Landmark {
            point: left.point.midpoint(&right.point),
            visibility: left.visibility.min(right.visibility),
        })
    }

    /// Distance between two keypoints, if both are present.
    pub fn distance(&self, a: Keypoint, b: Keypoint) -> Option<f32> {
        let pa = self.get(a)?;
        let pb = self.get(b)?;
        Some(pa.point.distance(&pb.point))
    }
}

impl Default for PoseLandmarks {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit system of the user-supplied height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    /// Convert a length in this unit system (cm or inches) to centimeters.
    pub fn to_centimeters(self, value: f32) -> f32 {
        match self {
            UnitSystem::Metric => value,
            UnitSystem::Imperial => value * CM_PER_INCH,
        }
    }
}

/// The body parts tracked by the statistical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPart {
    Chest,
    Waist,
    Hips,
    Inseam,
    Shoulder,
    Sleeve,
    Neck,
    Thigh,
}

impl BodyPart {
    pub const ALL: [BodyPart; 8] = [
        BodyPart::Chest,
        BodyPart::Waist,
        BodyPart::Hips,
        BodyPart::Inseam,
        BodyPart::Shoulder,
        BodyPart::Sleeve,
        BodyPart::Neck,
        BodyPart::Thigh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BodyPart::Chest => "chest",
            BodyPart::Waist => "waist",
            BodyPart::Hips => "hips",
            BodyPart::Inseam => "inseam",
            BodyPart::Shoulder => "shoulder",
            BodyPart::Sleeve => "sleeve",
            BodyPart::Neck => "neck",
            BodyPart::Thigh => "thigh",
        }
    }
}

impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key under which the pipeline stores the normalized height.
pub const HEIGHT_KEY: &str = "height";

/// Measurements in centimeters keyed by name.
///
/// The key set is open: besides the [`BodyPart`] names, callers store
/// display fields such as [`HEIGHT_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementSet {
    values: BTreeMap<String, f32>,
}

impl MeasurementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.values.get(key).copied()
    }

    pub fn part(&self, part: BodyPart) -> Option<f32> {
        self.get(part.as_str())
    }

    pub fn insert(&mut self, key: impl Into<String>, value_cm: f32) {
        self.values.insert(key.into(), value_cm);
    }

    pub fn set_part(&mut self, part: BodyPart, value_cm: f32) {
        self.insert(part.as_str(), value_cm);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn has_part(&self, part: BodyPart) -> bool {
        self.contains(part.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<f32> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True when every value is finite and strictly positive.
    pub fn is_well_formed(&self) -> bool {
        self.values.values().all(|v| v.is_finite() && *v > 0.0)
    }
}

impl FromIterator<(String, f32)> for MeasurementSet {
    fn from_iter<T: IntoIterator<Item = (String, f32)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Round to one decimal place.
pub fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
