//! Detection loop state machine.
//!
//! `DetectionLoop` owns every piece of mutable session state (threshold,
//! mode, calibration, ledger) and is the only writer. Each call to
//! `process_frame` runs one synchronous scan → refine → gate → dispatch pass;
//! scheduling is up to the caller (see `runner`).
//!
//! ```text
//!            BeginCalibration               spot accepted
//!   Idle ───────────────────► Calibrating ─────────────────► Scoring
//!                                  ▲                            │
//!                                  └──── BeginCalibration ──────┘
//! ```

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::mem;
use std::time::{Duration, Instant};

use crate::calibration::{CalibrationReference, CalibrationStore};
use crate::command::{Command, DetectionStatus, Notification, Notifier};
use crate::detect::{RoiSpotDetector, Roi, SpotDetector};
use crate::export::SessionExport;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::ledger::{validate_capacity, ShotLedger, DEFAULT_LEDGER_CAPACITY};
use crate::scoring::{ScaleConfig, ScoringEngine, Shot};

pub const DEFAULT_THRESHOLD: f64 = 220.0;
pub const MAX_THRESHOLD: f64 = 255.0;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(300);
pub const DEFAULT_ROI: Roi = Roi {
    center_x: 160,
    center_y: 90,
    radius: 40,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// No calibration requested; detections are ignored.
    Idle,
    /// The next accepted detection becomes the calibration reference.
    Calibrating,
    /// Accepted detections become shots.
    Scoring,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Idle => "idle",
            Mode::Calibrating => "calibrating",
            Mode::Scoring => "scoring",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Adaptive frame skipping
// ----------------------------------------------------------------------------

pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(33);
pub const DEFAULT_RELAX_AFTER: u32 = 200;
pub const DEFAULT_MAX_SKIP: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSkipConfig {
    /// Processing time above which a frame counts as backlog.
    pub frame_budget: Duration,
    /// Consecutive in-budget processed frames before skipping relaxes.
    pub relax_after: u32,
    /// Upper bound on the skip target. `1` disables skipping.
    pub max_skip: u32,
}

impl Default for FrameSkipConfig {
    fn default() -> Self {
        Self {
            frame_budget: DEFAULT_FRAME_BUDGET,
            relax_after: DEFAULT_RELAX_AFTER,
            max_skip: DEFAULT_MAX_SKIP,
        }
    }
}

impl FrameSkipConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_budget.is_zero() {
            return Err(anyhow!("frame_budget must be > 0"));
        }
        if self.relax_after == 0 {
            return Err(anyhow!("relax_after must be > 0"));
        }
        if self.max_skip == 0 {
            return Err(anyhow!("max_skip must be >= 1"));
        }
        Ok(())
    }
}

/// Counter-based frame decimation.
///
/// Frame `n` is processed when `n % skip_target == 0`. Over-budget frames
/// raise the target, a run of in-budget frames lowers it again.
#[derive(Clone, Debug)]
pub struct FrameSkipper {
    config: FrameSkipConfig,
    counter: u64,
    skip_target: u32,
    clean_frames: u32,
}

impl FrameSkipper {
    pub fn new(config: FrameSkipConfig) -> Self {
        Self {
            config,
            counter: 0,
            skip_target: 1,
            clean_frames: 0,
        }
    }

    pub fn skip_target(&self) -> u32 {
        self.skip_target
    }

    /// Advance the frame counter; false means skip this frame.
    pub fn should_process(&mut self) -> bool {
        let n = self.counter;
        self.counter = self.counter.wrapping_add(1);
        n % self.skip_target as u64 == 0
    }

    /// Feed back the wall time spent on a processed frame.
    pub fn record_cost(&mut self, elapsed: Duration) {
        if elapsed > self.config.frame_budget {
            self.clean_frames = 0;
            if self.skip_target < self.config.max_skip {
                self.skip_target += 1;
                log::debug!(
                    "frame took {:?} (budget {:?}), processing every {} frames",
                    elapsed,
                    self.config.frame_budget,
                    self.skip_target
                );
            }
            return;
        }
        self.clean_frames += 1;
        if self.clean_frames >= self.config.relax_after {
            self.clean_frames = 0;
            if self.skip_target > 1 {
                self.skip_target -= 1;
                log::debug!("backlog cleared, processing every {} frames", self.skip_target);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Settings
// ----------------------------------------------------------------------------

/// Externally supplied session parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionSettings {
    /// Brightness cutoff in [0, 255]; a pixel qualifies when strictly above it.
    pub threshold: f64,
    pub roi: Roi,
    /// Minimum time between two accepted detections.
    pub cooldown: Duration,
    pub scale: ScaleConfig,
    pub ledger_capacity: usize,
    pub frame_skip: FrameSkipConfig,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            roi: DEFAULT_ROI,
            cooldown: DEFAULT_COOLDOWN,
            scale: ScaleConfig::default(),
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            frame_skip: FrameSkipConfig::default(),
        }
    }
}

impl DetectionSettings {
    pub fn validate(&self) -> Result<()> {
        validate_threshold(self.threshold)?;
        if self.roi.radius == 0 {
            return Err(anyhow!("roi radius must be > 0"));
        }
        self.scale.validate()?;
        validate_capacity(self.ledger_capacity)?;
        self.frame_skip.validate()?;
        Ok(())
    }
}

pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || !(0.0..=MAX_THRESHOLD).contains(&threshold) {
        return Err(anyhow!(
            "threshold must be within [0, {}] (got {})",
            MAX_THRESHOLD,
            threshold
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Per-frame results
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Dropped by adaptive frame skipping.
    Cadence,
    /// The source failed to deliver a frame.
    FrameUnavailable,
    /// The ROI does not fit inside the delivered frame.
    RoiOutOfBounds,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    /// Nothing in the ROI exceeded the threshold.
    NoDetection,
    /// Detection fell within the cooldown window of the last accepted one.
    CoolingDown,
    /// Detection while idle.
    Ignored,
    Calibrated(CalibrationReference),
    ShotRecorded(Shot),
}

/// Frame counters since the loop was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub frames_failed: u64,
    pub detections: u64,
    pub shots_recorded: u64,
}

// ----------------------------------------------------------------------------
// Detection loop
// ----------------------------------------------------------------------------

pub struct DetectionLoop<D: SpotDetector = RoiSpotDetector> {
    settings: DetectionSettings,
    detector: D,
    mode: Mode,
    calibration: CalibrationStore,
    engine: ScoringEngine,
    ledger: ShotLedger,
    skipper: FrameSkipper,
    last_accepted: Option<Instant>,
    status: DetectionStatus,
    notifier: Notifier,
    stats: LoopStats,
}

impl DetectionLoop<RoiSpotDetector> {
    pub fn new(settings: DetectionSettings) -> Result<Self> {
        Self::with_detector(settings, RoiSpotDetector::new())
    }
}

impl<D: SpotDetector> DetectionLoop<D> {
    pub fn with_detector(settings: DetectionSettings, detector: D) -> Result<Self> {
        settings.validate()?;
        let engine = ScoringEngine::new(settings.scale)?;
        let ledger = ShotLedger::new(settings.ledger_capacity)?;
        let skipper = FrameSkipper::new(settings.frame_skip);
        log::info!(
            "detection loop ready: detector={} threshold={} roi=({}, {}) r={} cooldown={:?} capacity={}",
            detector.name(),
            settings.threshold,
            settings.roi.center_x,
            settings.roi.center_y,
            settings.roi.radius,
            settings.cooldown,
            settings.ledger_capacity
        );
        Ok(Self {
            settings,
            detector,
            mode: Mode::Idle,
            calibration: CalibrationStore::new(),
            engine,
            ledger,
            skipper,
            last_accepted: None,
            status: DetectionStatus::Ok,
            notifier: Notifier::disconnected(),
            stats: LoopStats::default(),
        })
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn threshold(&self) -> f64 {
        self.settings.threshold
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn calibration(&self) -> Option<CalibrationReference> {
        self.calibration.reference()
    }

    pub fn ledger(&self) -> &ShotLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn status(&self) -> &DetectionStatus {
        &self.status
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn skipper(&self) -> &FrameSkipper {
        &self.skipper
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Apply one command from the command channel.
    pub fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::BeginCalibration => self.begin_calibration(),
            Command::ClearShots => self.clear_shots(),
            Command::SetThreshold(value) => {
                self.set_threshold(value)?;
            }
            Command::RequestExport => {
                let export = self.export();
                self.notifier.emit(Notification::ExportReady(export));
            }
        }
        Ok(())
    }

    /// Drop calibration and shots and wait for a calibration spot.
    ///
    /// The cooldown window and smoothing history carry over: the tail of a
    /// shot that was just accepted cannot become the new reference.
    pub fn begin_calibration(&mut self) {
        self.calibration.clear();
        self.ledger.clear();
        self.set_mode(Mode::Calibrating);
        self.set_status(DetectionStatus::AwaitingCalibration);
    }

    /// Empty the ledger. Mode and calibration are kept.
    pub fn clear_shots(&mut self) {
        let dropped = self.ledger.len();
        self.ledger.clear();
        log::info!("cleared {} shots", dropped);
        self.notifier.emit(Notification::ShotsCleared);
    }

    /// Set the sensitivity threshold, clamped to [0, 255]. NaN is rejected.
    pub fn set_threshold(&mut self, value: f64) -> Result<f64> {
        if value.is_nan() {
            return Err(anyhow!("threshold must be a number"));
        }
        let clamped = value.clamp(0.0, MAX_THRESHOLD);
        if clamped != value {
            log::warn!("threshold {} clamped to {}", value, clamped);
        }
        self.settings.threshold = clamped;
        log::info!("threshold set to {}", clamped);
        self.notifier.emit(Notification::ThresholdChanged(clamped));
        Ok(clamped)
    }

    /// Snapshot of the retained shots.
    pub fn export(&self) -> SessionExport {
        SessionExport::from_ledger(&self.ledger, Utc::now())
    }

    /// Pull one frame from `source` and process it. Read failures skip the
    /// frame and never end the loop.
    pub fn pull_frame<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> FrameOutcome {
        match source.next_frame() {
            Ok(frame) => self.process_frame(&frame),
            Err(e) => {
                log::debug!("frame read failed: {}", e);
                self.frame_failed(format!("frame unavailable: {}", e));
                FrameOutcome::Skipped(SkipReason::FrameUnavailable)
            }
        }
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        self.process_frame_at(frame, Instant::now())
    }

    /// Process `frame` as if it arrived at `now`.
    pub fn process_frame_at(&mut self, frame: &Frame, now: Instant) -> FrameOutcome {
        if !self.skipper.should_process() {
            self.stats.frames_skipped += 1;
            return FrameOutcome::Skipped(SkipReason::Cadence);
        }

        let roi = self.settings.roi;
        if !roi.fits_within(frame.width(), frame.height()) {
            self.frame_failed(format!(
                "roi does not fit a {}x{} frame",
                frame.width(),
                frame.height()
            ));
            return FrameOutcome::Skipped(SkipReason::RoiOutOfBounds);
        }

        let started = Instant::now();
        let detection = self.detector.detect(frame, &roi, self.settings.threshold);
        self.skipper.record_cost(started.elapsed());
        self.stats.frames_processed += 1;
        self.set_status(self.nominal_status());

        let Some(centroid) = detection else {
            return FrameOutcome::NoDetection;
        };
        self.stats.detections += 1;

        if self.mode == Mode::Idle {
            return FrameOutcome::Ignored;
        }
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) <= self.settings.cooldown {
                return FrameOutcome::CoolingDown;
            }
        }
        self.last_accepted = Some(now);

        match self.mode {
            Mode::Calibrating => {
                let reference = self.calibration.capture(centroid, &roi);
                log::info!(
                    "calibration captured at ({:.2}, {:.2}), offset ({:.2}, {:.2})",
                    centroid.x,
                    centroid.y,
                    reference.offset_x,
                    reference.offset_y
                );
                self.notifier
                    .emit(Notification::CalibrationCaptured(reference));
                self.set_mode(Mode::Scoring);
                self.set_status(DetectionStatus::Ok);
                FrameOutcome::Calibrated(reference)
            }
            Mode::Scoring => {
                let Some(reference) = self.calibration.reference() else {
                    return FrameOutcome::Ignored;
                };
                let shot = self
                    .ledger
                    .record(self.engine.score(centroid, &reference, &roi));
                self.stats.shots_recorded += 1;
                log::info!(
                    "shot #{}: score {:.1} ring {} ({:.1}mm, dx={:.1} dy={:.1})",
                    shot.sequence(),
                    shot.score(),
                    shot.ring().map_or_else(|| "-".to_string(), |ring| ring.to_string()),
                    shot.distance_mm(),
                    shot.dx(),
                    shot.dy()
                );
                self.notifier.emit(Notification::ShotRecorded(shot.clone()));
                FrameOutcome::ShotRecorded(shot)
            }
            Mode::Idle => FrameOutcome::Ignored,
        }
    }

    fn nominal_status(&self) -> DetectionStatus {
        if self.mode == Mode::Calibrating {
            DetectionStatus::AwaitingCalibration
        } else {
            DetectionStatus::Ok
        }
    }

    fn frame_failed(&mut self, reason: String) {
        self.stats.frames_failed += 1;
        self.set_status(DetectionStatus::Error(reason));
    }

    fn set_mode(&mut self, to: Mode) {
        if self.mode == to {
            return;
        }
        let from = mem::replace(&mut self.mode, to);
        log::info!("mode {} -> {}", from, to);
        self.notifier.emit(Notification::ModeChanged { from, to });
    }

    /// Record `status`, notifying only when its kind changes.
    fn set_status(&mut self, status: DetectionStatus) {
        if mem::discriminant(&self.status) == mem::discriminant(&status) {
            return;
        }
        match &status {
            DetectionStatus::Error(reason) => log::warn!("skipping frames: {}", reason),
            DetectionStatus::AwaitingCalibration => log::info!("waiting for calibration spot"),
            DetectionStatus::Ok => log::info!("detection ok"),
        }
        self.status = status.clone();
        self.notifier.emit(Notification::DetectionStatus(status));
    }
}
