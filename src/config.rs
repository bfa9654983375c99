use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::GeometryScales;
use crate::quality::ValidationMode;

/// Pipeline tuning. Missing fields in a config file fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub validation: ValidationMode,
    /// Upper bound on landmark extraction.
    pub landmark_timeout_ms: u64,
    /// Landmark quality assumed in permissive mode when extraction fails.
    pub landmark_floor: f32,
    /// Minimum landmark quality for geometric measurement.
    pub geometric_min_quality: f32,
    /// Landmark quality above which geometric values win over statistical ones.
    pub preserve_geometric_quality: f32,
    /// Confidence that must be exceeded before proportion refinement runs.
    pub refine_threshold: f32,
    pub geometry: GeometryScales,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validation: ValidationMode::Strict,
            landmark_timeout_ms: 5_000,
            landmark_floor: 0.6,
            geometric_min_quality: 0.5,
            preserve_geometric_quality: 0.7,
            refine_threshold: 0.8,
            geometry: GeometryScales::default(),
        }
    }
}

impl PipelineConfig {
    pub fn permissive() -> Self {
        Self {
            validation: ValidationMode::Permissive,
            ..Self::default()
        }
    }

    pub fn landmark_timeout(&self) -> Duration {
        Duration::from_millis(self.landmark_timeout_ms)
    }

    /// Read a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("landmark_floor", self.landmark_floor),
            ("geometric_min_quality", self.geometric_min_quality),
            ("preserve_geometric_quality", self.preserve_geometric_quality),
            ("refine_threshold", self.refine_threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidInput(format!("{name} must be in [0, 1], got {value}")));
            }
        }

        let g = &self.geometry;
        if ![g.shoulder, g.hip, g.inseam, g.sleeve]
            .iter()
            .all(|s| s.is_finite() && *s > 0.0)
        {
            return Err(Error::InvalidInput(format!("geometry scales must be positive: {g:?}")));
        }
        Ok(())
    }
}
