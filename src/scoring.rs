//! Displacement and score computation.
//!
//! Scoring is a linear falloff: every `MM_PER_POINT` millimetres of radial
//! miss costs one point, floored at zero, rounded to one decimal. The ring
//! table used for display follows the same law (ring `k` has radius
//! `MM_PER_POINT * (10 - k)`).

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationReference;
use crate::detect::{Centroid, Roi};

pub const MAX_SCORE: f64 = 10.0;
pub const MM_PER_POINT: f64 = 5.0;

pub const DEFAULT_CAMERA_PX_PER_MM: f64 = 0.3;
pub const DEFAULT_DISPLAY_PX_PER_MM: f64 = 3.0;

/// Linear scale factors between camera pixels, millimetres and display pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    /// Camera pixels per millimetre on the target plane.
    pub camera_px_per_mm: f64,
    /// Display pixels per millimetre in the rendered target.
    pub display_px_per_mm: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            camera_px_per_mm: DEFAULT_CAMERA_PX_PER_MM,
            display_px_per_mm: DEFAULT_DISPLAY_PX_PER_MM,
        }
    }
}

impl ScaleConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("camera_px_per_mm", self.camera_px_per_mm),
            ("display_px_per_mm", self.display_px_per_mm),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(anyhow!("{} must be a positive number (got {})", name, value));
            }
        }
        Ok(())
    }

    pub fn camera_px_to_mm(&self, px: f64) -> f64 {
        px / self.camera_px_per_mm
    }

    pub fn mm_to_display_px(&self, mm: f64) -> f64 {
        mm * self.display_px_per_mm
    }
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Score for a radial miss of `distance_mm`, in `[0, 10]`, one decimal.
pub fn score_for_distance(distance_mm: f64) -> f64 {
    round_to_tenth((MAX_SCORE - distance_mm / MM_PER_POINT).max(0.0))
}

// ----------------------------------------------------------------------------
// Shots
// ----------------------------------------------------------------------------

/// One recorded shot. Fields are read-only once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    sequence: u32,
    dx: f64,
    dy: f64,
    distance_mm: f64,
    score: f64,
    ring: Option<u8>,
}

impl Shot {
    /// Position in the session, starting at 1. Zero until recorded.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Horizontal displacement in display pixels (positive = right).
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Vertical displacement in display pixels (positive = down).
    pub fn dy(&self) -> f64 {
        self.dy
    }

    pub fn distance_mm(&self) -> f64 {
        self.distance_mm
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Display ring the shot landed in; `None` outside the outermost ring.
    pub fn ring(&self) -> Option<u8> {
        self.ring
    }

    pub(crate) fn sequenced(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }
}

// ----------------------------------------------------------------------------
// Ring table
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub score: u8,
    pub radius_mm: f64,
}

/// Display rings, highest score first.
#[derive(Clone, Debug, PartialEq)]
pub struct RingTable {
    rings: Vec<Ring>,
}

impl RingTable {
    /// Rings 10 down to 1.
    pub fn standard() -> Self {
        let rings = (1..=10u8)
            .rev()
            .map(|score| Ring {
                score,
                radius_mm: linear_ring_radius(score),
            })
            .collect();
        Self { rings }
    }

    /// Build a table from explicit `(score, radius_mm)` pairs. Every radius must
    /// agree with the scoring law.
    pub fn from_radii(radii: &[(u8, f64)]) -> Result<Self> {
        if radii.is_empty() {
            return Err(anyhow!("ring table must not be empty"));
        }
        let mut rings = Vec::with_capacity(radii.len());
        for &(score, radius_mm) in radii {
            if score > MAX_SCORE as u8 {
                return Err(anyhow!("ring score {} exceeds {}", score, MAX_SCORE));
            }
            let expected = linear_ring_radius(score);
            if (radius_mm - expected).abs() > 1e-6 {
                return Err(anyhow!(
                    "ring {} radius {}mm disagrees with scoring (expected {}mm)",
                    score,
                    radius_mm,
                    expected
                ));
            }
            rings.push(Ring { score, radius_mm });
        }
        rings.sort_by(|a, b| b.score.cmp(&a.score));
        rings.dedup_by_key(|ring| ring.score);
        Ok(Self { rings })
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn radius_mm(&self, score: u8) -> Option<f64> {
        self.rings
            .iter()
            .find(|ring| ring.score == score)
            .map(|ring| ring.radius_mm)
    }

    pub fn display_radius_px(&self, score: u8, scale: &ScaleConfig) -> Option<f64> {
        self.radius_mm(score).map(|mm| scale.mm_to_display_px(mm))
    }

    /// Highest ring whose circle contains `distance_mm`.
    pub fn ring_for_distance(&self, distance_mm: f64) -> Option<u8> {
        self.rings
            .iter()
            .find(|ring| distance_mm <= ring.radius_mm)
            .map(|ring| ring.score)
    }
}

impl Default for RingTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn linear_ring_radius(score: u8) -> f64 {
    MM_PER_POINT * (MAX_SCORE - score as f64)
}

// ----------------------------------------------------------------------------
// Scoring engine
// ----------------------------------------------------------------------------

/// Converts a centroid into a displacement and score relative to calibration.
#[derive(Clone, Debug)]
pub struct ScoringEngine {
    scale: ScaleConfig,
    rings: RingTable,
}

impl ScoringEngine {
    pub fn new(scale: ScaleConfig) -> Result<Self> {
        Self::with_rings(scale, RingTable::standard())
    }

    pub fn with_rings(scale: ScaleConfig, rings: RingTable) -> Result<Self> {
        scale.validate()?;
        Ok(Self { scale, rings })
    }

    pub fn scale(&self) -> &ScaleConfig {
        &self.scale
    }

    /// Score `centroid` against the aim point `calibration` defines within `roi`.
    ///
    /// The returned shot is unsequenced; the ledger numbers it on insertion.
    pub fn score(
        &self,
        centroid: Centroid,
        calibration: &CalibrationReference,
        roi: &Roi,
    ) -> Shot {
        let aim = calibration.aim_point(roi);
        let dx_mm = self.scale.camera_px_to_mm(centroid.x - aim.x);
        let dy_mm = self.scale.camera_px_to_mm(centroid.y - aim.y);
        let distance_mm = dx_mm.hypot(dy_mm);

        Shot {
            sequence: 0,
            dx: self.scale.mm_to_display_px(dx_mm),
            dy: self.scale.mm_to_display_px(dy_mm),
            distance_mm,
            score: score_for_distance(distance_mm),
            ring: self.rings.ring_for_distance(distance_mm),
        }
    }
}
