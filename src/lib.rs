//! Shot Capture and Target Tracking kernel (scatt)
//!
//! This crate turns a stream of decoded camera frames into scored shots from a
//! laser training pistol.
//!
//! # Pipeline
//!
//! ```text
//! FrameSource → Frame → scan (ROI peak) → CentroidRefiner (sub-pixel + smoothing)
//!     → DetectionLoop (mode + cooldown gating)
//!         → CalibrationStore          (Calibrating)
//!         → ScoringEngine → ShotLedger (Scoring)
//! ```
//!
//! The detection loop is the single owner of session state. Everything from
//! the outside arrives as a `Command` and leaves as a `Notification`.
//!
//! # Module Structure
//!
//! - `frame`: Decoded pixel buffers (Frame, PixelFormat)
//! - `detect`: ROI scan, centroid refinement, the `SpotDetector` seam
//! - `calibration`, `scoring`, `ledger`: Aim reference, scoring law, shot history
//! - `session`: DetectionLoop state machine and adaptive frame skipping
//! - `command`: Command/notification vocabulary
//! - `runner`: Threaded driver with stop-at-frame-boundary
//! - `ingest`: Frame sources (synthetic target, image directories)
//! - `export`: Session export document
//! - `config`: File + environment configuration

pub mod calibration;
pub mod command;
pub mod config;
pub mod detect;
pub mod export;
pub mod frame;
pub mod ingest;
pub mod ledger;
pub mod runner;
pub mod scoring;
pub mod session;

pub use calibration::{CalibrationReference, CalibrationStore};
pub use command::{Command, DetectionStatus, Notification, Notifier};
pub use config::ScattConfig;
pub use detect::{Centroid, CentroidRefiner, PeakPixel, Roi, RoiSpotDetector, SpotDetector};
pub use export::{ExportShot, SessionExport};
pub use frame::{Frame, PixelFormat};
pub use ingest::{open_source, FrameSource, SourceConfig, SourceStats, SyntheticSource};
pub use ledger::{LedgerStats, ShotLedger, DEFAULT_LEDGER_CAPACITY, MAX_LEDGER_CAPACITY};
pub use runner::{RunnerHandle, SessionRunner};
pub use scoring::{RingTable, ScaleConfig, ScoringEngine, Shot};
pub use session::{
    DetectionLoop, DetectionSettings, FrameOutcome, FrameSkipConfig, FrameSkipper, LoopStats,
    Mode, SkipReason,
};
