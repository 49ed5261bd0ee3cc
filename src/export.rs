//! Session export document.
//!
//! Existing consumers read `{ timestamp, shots: [{dx, dy, score}], totalScore,
//! shotCount }` with scores at one decimal. Those names and that precision
//! are part of the format.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ledger::ShotLedger;
use crate::scoring::{round_to_tenth, MAX_SCORE};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportShot {
    pub dx: f64,
    pub dy: f64,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub timestamp: DateTime<Utc>,
    pub shots: Vec<ExportShot>,
    pub total_score: f64,
    pub shot_count: usize,
}

impl SessionExport {
    /// Snapshot the retained shots of `ledger`.
    pub fn from_ledger(ledger: &ShotLedger, timestamp: DateTime<Utc>) -> Self {
        let shots: Vec<ExportShot> = ledger
            .shots()
            .map(|shot| ExportShot {
                dx: shot.dx(),
                dy: shot.dy(),
                score: round_to_tenth(shot.score()),
            })
            .collect();
        let total_score = round_to_tenth(shots.iter().map(|shot| shot.score).sum());
        Self {
            timestamp,
            shot_count: shots.len(),
            shots,
            total_score,
        }
    }

    /// `scatt_session_<YYYY-MM-DD>.json`
    pub fn file_name(&self) -> String {
        format!("scatt_session_{}.json", self.timestamp.format("%Y-%m-%d"))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| anyhow!("invalid session export: {}", e))
    }

    /// Write the document into `dir` and return its path.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export dir {}", dir.display()))?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_json_pretty()?)
            .with_context(|| format!("failed to write session export {}", path.display()))?;
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read session export {}: {}", path.display(), e))?;
        Self::from_json(&raw)
    }

    /// Internal consistency of the document.
    pub fn verify(&self) -> Result<()> {
        if self.shot_count != self.shots.len() {
            return Err(anyhow!(
                "shotCount {} does not match {} listed shots",
                self.shot_count,
                self.shots.len()
            ));
        }
        for (i, shot) in self.shots.iter().enumerate() {
            if !(0.0..=MAX_SCORE).contains(&shot.score) {
                return Err(anyhow!("shot {} score {} outside [0, 10]", i + 1, shot.score));
            }
            if round_to_tenth(shot.score) != shot.score {
                return Err(anyhow!(
                    "shot {} score {} has more than one decimal",
                    i + 1,
                    shot.score
                ));
            }
            if !shot.dx.is_finite() || !shot.dy.is_finite() {
                return Err(anyhow!("shot {} displacement is not finite", i + 1));
            }
        }
        let expected_total = round_to_tenth(self.shots.iter().map(|shot| shot.score).sum());
        if (expected_total - self.total_score).abs() > 1e-9 {
            return Err(anyhow!(
                "totalScore {} does not match sum of shots {}",
                self.total_score,
                expected_total
            ));
        }
        Ok(())
    }
}
