//! Bounded shot history with aggregate statistics.
//!
//! Shots are numbered on insertion. When the ledger is full the oldest shot
//! is evicted first, and statistics only ever cover the retained window.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::scoring::{round_to_tenth, Shot};

pub const DEFAULT_LEDGER_CAPACITY: usize = 50;

/// Largest capacity a session may be configured with.
pub const MAX_LEDGER_CAPACITY: usize = 200;

/// Aggregates over the retained shots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub count: usize,
    /// Sum of retained scores, one decimal.
    pub total: f64,
    pub mean: f64,
    /// Highest retained score (0 when empty).
    pub best: f64,
}

pub struct ShotLedger {
    shots: VecDeque<Shot>,
    capacity: usize,
    next_sequence: u32,
}

impl ShotLedger {
    pub fn new(capacity: usize) -> Result<Self> {
        validate_capacity(capacity)?;
        Ok(Self {
            shots: VecDeque::with_capacity(capacity),
            capacity,
            next_sequence: 1,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    /// Number `shot`, append it, and evict from the front while over capacity.
    /// Returns the stored shot.
    pub fn record(&mut self, shot: Shot) -> Shot {
        let shot = shot.sequenced(self.next_sequence);
        self.next_sequence = self.next_sequence.saturating_add(1);

        while self.shots.len() >= self.capacity {
            if let Some(evicted) = self.shots.pop_front() {
                log::debug!("ledger full, evicting shot #{}", evicted.sequence());
            }
        }
        self.shots.push_back(shot.clone());
        shot
    }

    /// Retained shots, oldest first.
    pub fn shots(&self) -> impl Iterator<Item = &Shot> {
        self.shots.iter()
    }

    pub fn latest(&self) -> Option<&Shot> {
        self.shots.back()
    }

    pub fn stats(&self) -> LedgerStats {
        let count = self.shots.len();
        if count == 0 {
            return LedgerStats::default();
        }
        let sum: f64 = self.shots.iter().map(Shot::score).sum();
        let best = self
            .shots
            .iter()
            .map(Shot::score)
            .fold(f64::NEG_INFINITY, f64::max);
        LedgerStats {
            count,
            total: round_to_tenth(sum),
            mean: sum / count as f64,
            best,
        }
    }

    /// Owned copy of the retained shots for export.
    pub fn snapshot(&self) -> Vec<Shot> {
        self.shots.iter().cloned().collect()
    }

    /// Drop every shot and restart numbering.
    pub fn clear(&mut self) {
        self.shots.clear();
        self.next_sequence = 1;
    }
}

pub fn validate_capacity(capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(anyhow!("ledger capacity must be > 0"));
    }
    if capacity > MAX_LEDGER_CAPACITY {
        return Err(anyhow!(
            "ledger capacity {} exceeds session cap {}",
            capacity,
            MAX_LEDGER_CAPACITY
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationReference;
    use crate::detect::{Centroid, Roi};
    use crate::scoring::{ScaleConfig, ScoringEngine};

    /// Shot landing `dx_px` camera pixels right of center.
    fn shot_at(dx_px: f64) -> Shot {
        let engine = ScoringEngine::new(ScaleConfig::default()).unwrap();
        let roi = Roi::new(160, 90, 40).unwrap();
        let reference = CalibrationReference {
            offset_x: 0.0,
            offset_y: 0.0,
        };
        engine.score(Centroid::new(160.0 + dx_px, 90.0), &reference, &roi)
    }

    #[test]
    fn capacity_bounds_are_enforced() {
        assert!(ShotLedger::new(0).is_err());
        assert!(ShotLedger::new(MAX_LEDGER_CAPACITY + 1).is_err());
        assert!(ShotLedger::new(MAX_LEDGER_CAPACITY).is_ok());
    }

    #[test]
    fn records_are_numbered_in_order() {
        let mut ledger = ShotLedger::new(5).unwrap();
        let a = ledger.record(shot_at(0.0));
        let b = ledger.record(shot_at(3.0));
        assert_eq!((a.sequence(), b.sequence()), (1, 2));
        assert_eq!(ledger.latest(), Some(&b));
    }

    #[test]
    fn overflow_evicts_oldest_and_stats_follow_window() {
        let mut ledger = ShotLedger::new(3).unwrap();
        // 3px -> 10mm -> 8.0, then 10.0, 9.0, 7.0
        ledger.record(shot_at(3.0));
        ledger.record(shot_at(0.0));
        ledger.record(shot_at(1.5));
        ledger.record(shot_at(4.5));

        assert_eq!(ledger.len(), 3);
        let sequences: Vec<u32> = ledger.shots().map(Shot::sequence).collect();
        assert_eq!(sequences, vec![2, 3, 4]);

        let stats = ledger.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.total, 26.0);
        assert!((stats.mean - 26.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.best, 10.0);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut ledger = ShotLedger::new(DEFAULT_LEDGER_CAPACITY).unwrap();
        for i in 0..(DEFAULT_LEDGER_CAPACITY * 3) {
            ledger.record(shot_at((i % 7) as f64));
            assert!(ledger.len() <= DEFAULT_LEDGER_CAPACITY);
        }
        assert_eq!(
            ledger.shots().next().map(Shot::sequence),
            Some(DEFAULT_LEDGER_CAPACITY as u32 * 2 + 1)
        );
    }

    #[test]
    fn clear_empties_and_restarts_numbering() {
        let mut ledger = ShotLedger::new(4).unwrap();
        ledger.record(shot_at(1.0));
        ledger.record(shot_at(2.0));
        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.stats(), LedgerStats::default());
        assert_eq!(ledger.record(shot_at(0.0)).sequence(), 1);
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let mut ledger = ShotLedger::new(4).unwrap();
        ledger.record(shot_at(1.0));
        let snapshot = ledger.snapshot();
        ledger.clear();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].sequence(), 1);
    }
}
