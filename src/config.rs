use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Tuning for the edge extractor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Radius of the mean blur; 1 gives a 3x3 kernel.
    pub blur_radius: u32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_radius: 1,
            canny_low: 100.0,
            canny_high: 100.0,
        }
    }
}

/// Tuning for the probabilistic Hough line detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Distance resolution of the accumulator, in pixels.
    pub rho: f64,
    /// Angle resolution of the accumulator, in radians.
    pub theta: f64,
    /// Minimum number of votes for a line to be considered.
    pub threshold: u32,
    pub min_line_length: u32,
    /// Longest run of unset pixels bridged while following a line.
    pub max_line_gap: u32,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            theta: PI / 180.0,
            threshold: 70,
            min_line_length: 30,
            max_line_gap: 10,
        }
    }
}

/// Which line intersections are kept as corner candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntersectionBounds {
    /// Keep points with both coordinates >= 0. Points past the right or
    /// bottom border still pass.
    #[default]
    NonNegative,
    /// Keep points inside `[0, width] x [0, height]`.
    WithinImage,
}

impl IntersectionBounds {
    pub fn accepts(&self, x: f64, y: f64, width: u32, height: u32) -> bool {
        match self {
            IntersectionBounds::NonNegative => x >= 0.0 && y >= 0.0,
            IntersectionBounds::WithinImage => {
                x >= 0.0 && y >= 0.0 && x <= width as f64 && y <= height as f64
            }
        }
    }
}

/// Finest Hough distance step; smaller steps blow up the accumulator.
pub const MIN_RHO: f64 = 0.5;
/// Finest Hough angle step (0.05 degrees).
pub const MIN_THETA: f64 = PI / 3600.0;
/// Largest vote threshold; also keeps the count within `i32`.
pub const MAX_THRESHOLD: u32 = 1 << 20;
pub const MAX_BLUR_RADIUS: u32 = 64;

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// All knobs of the perspective correction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub edges: EdgeConfig,
    pub lines: LineConfig,
    pub bounds: IntersectionBounds,
    /// Douglas-Peucker epsilon as a fraction of the intersection cloud perimeter.
    pub approx_epsilon_ratio: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            edges: EdgeConfig::default(),
            lines: LineConfig::default(),
            bounds: IntersectionBounds::default(),
            approx_epsilon_ratio: 0.02,
        }
    }
}

impl CorrectionConfig {
    /// Load a JSON config file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            Error::Config(format!("failed to parse config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let lines = &self.lines;
        if !lines.rho.is_finite() || lines.rho < MIN_RHO {
            return Err(Error::Config(format!(
                "Hough rho ({}) must be at least {MIN_RHO}",
                lines.rho
            )));
        }
        if !(MIN_THETA..=PI).contains(&lines.theta) {
            return Err(Error::Config(format!(
                "Hough theta ({}) must lie in [{MIN_THETA}, pi]",
                lines.theta
            )));
        }
        if lines.threshold == 0 || lines.threshold > MAX_THRESHOLD {
            return Err(Error::Config(format!(
                "Hough threshold ({}) must lie in [1, {MAX_THRESHOLD}]",
                lines.threshold
            )));
        }
        if self.edges.blur_radius > MAX_BLUR_RADIUS {
            return Err(Error::Config(format!(
                "blur_radius ({}) exceeds {MAX_BLUR_RADIUS}",
                self.edges.blur_radius
            )));
        }
        if !self.edges.canny_low.is_finite() || !self.edges.canny_high.is_finite() {
            return Err(Error::Config("Canny thresholds must be finite".to_string()));
        }
        if !is_positive(self.approx_epsilon_ratio) {
            return Err(Error::Config(
                "approx_epsilon_ratio must be positive".to_string(),
            ));
        }
        if self.edges.canny_low > self.edges.canny_high {
            return Err(Error::Config(format!(
                "canny_low ({}) exceeds canny_high ({})",
                self.edges.canny_low, self.edges.canny_high
            )));
        }
        Ok(())
    }
}
