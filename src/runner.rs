//! Threaded driver for a `DetectionLoop`.
//!
//! The runner thread is the single writer: it drains pending commands, pulls
//! and processes one frame, then sleeps for the rest of the frame interval.
//! Stopping is checked between frames, so a stopped session always hands back
//! a consistent calibration and ledger.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::command::Command;
use crate::detect::{RoiSpotDetector, SpotDetector};
use crate::ingest::FrameSource;
use crate::session::{DetectionLoop, FrameOutcome};

pub struct SessionRunner<D: SpotDetector = RoiSpotDetector> {
    detection: DetectionLoop<D>,
    source: Box<dyn FrameSource>,
    commands: Receiver<Command>,
    commands_open: bool,
    frame_interval: Duration,
}

impl<D: SpotDetector + 'static> SessionRunner<D> {
    /// `source` must already be connected.
    pub fn new(
        detection: DetectionLoop<D>,
        source: Box<dyn FrameSource>,
        commands: Receiver<Command>,
        target_fps: u32,
    ) -> Result<Self> {
        if target_fps == 0 {
            return Err(anyhow!("target_fps must be > 0"));
        }
        Ok(Self {
            detection,
            source,
            commands,
            commands_open: true,
            frame_interval: Duration::from_secs(1) / target_fps,
        })
    }

    pub fn detection(&self) -> &DetectionLoop<D> {
        &self.detection
    }

    pub fn source(&self) -> &dyn FrameSource {
        self.source.as_ref()
    }

    /// Apply every queued command. Returns how many were handled, rejected
    /// ones included.
    pub fn drain_commands(&mut self) -> usize {
        let mut handled = 0;
        while self.commands_open {
            match self.commands.try_recv() {
                Ok(command) => {
                    log::debug!("command: {:?}", command);
                    if let Err(e) = self.detection.handle_command(command) {
                        log::warn!("command rejected: {}", e);
                    }
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::debug!("command channel closed");
                    self.commands_open = false;
                }
            }
        }
        handled
    }

    /// One frame boundary: commands first, then a frame.
    pub fn step(&mut self) -> FrameOutcome {
        self.drain_commands();
        self.detection.pull_frame(self.source.as_mut())
    }

    pub fn into_detection(self) -> DetectionLoop<D> {
        self.detection
    }

    pub fn spawn(mut self) -> Result<RunnerHandle<D>> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("scatt-detection".to_string())
            .spawn(move || {
                while !shutdown_thread.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    self.step();
                    if let Some(rest) = self.frame_interval.checked_sub(started.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }
                // Commands sent right before stop still land.
                self.drain_commands();
                self.into_detection()
            })?;
        Ok(RunnerHandle {
            shutdown,
            join: Some(join),
        })
    }
}

pub struct RunnerHandle<D: SpotDetector = RoiSpotDetector> {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<DetectionLoop<D>>>,
}

impl<D: SpotDetector> RunnerHandle<D> {
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop at the next frame boundary and return the session state.
    pub fn stop(mut self) -> Result<DetectionLoop<D>> {
        self.shutdown.store(true, Ordering::SeqCst);
        let join = self
            .join
            .take()
            .ok_or_else(|| anyhow!("detection thread already joined"))?;
        join.join()
            .map_err(|_| anyhow!("detection thread panicked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{SourceConfig, Spot, SpotScript, SyntheticSource};
    use crate::session::{DetectionSettings, FrameSkipConfig, Mode, SkipReason};
    use std::sync::mpsc;

    fn settings() -> DetectionSettings {
        DetectionSettings {
            cooldown: Duration::ZERO,
            frame_skip: FrameSkipConfig {
                max_skip: 1,
                ..FrameSkipConfig::default()
            },
            ..DetectionSettings::default()
        }
    }

    fn source(script: SpotScript) -> Box<dyn FrameSource> {
        let mut source = SyntheticSource::new(SourceConfig::default()).with_script(script);
        source.connect().unwrap();
        Box::new(source)
    }

    #[test]
    fn commands_apply_before_the_frame() {
        let spot = Spot::new(160.0, 90.0, 3.0, 250);
        let script = SpotScript::new().hold(spot, 1).dark(1).hold(spot, 1);
        let (tx, rx) = mpsc::channel();
        let detection = DetectionLoop::new(settings()).unwrap();
        let mut runner = SessionRunner::new(detection, source(script), rx, 30).unwrap();

        tx.send(Command::BeginCalibration).unwrap();
        assert!(matches!(runner.step(), FrameOutcome::Calibrated(_)));
        assert_eq!(runner.step(), FrameOutcome::NoDetection);
        assert!(matches!(runner.step(), FrameOutcome::ShotRecorded(_)));
        assert_eq!(runner.detection().mode(), Mode::Scoring);
        assert_eq!(runner.source().stats().frames_captured, 3);
    }

    #[test]
    fn rejected_commands_do_not_stop_the_runner() {
        let (tx, rx) = mpsc::channel();
        let detection = DetectionLoop::new(settings()).unwrap();
        let mut runner =
            SessionRunner::new(detection, source(SpotScript::new()), rx, 30).unwrap();
        tx.send(Command::SetThreshold(f64::NAN)).unwrap();
        tx.send(Command::SetThreshold(190.0)).unwrap();
        drop(tx);
        assert_eq!(runner.drain_commands(), 2);
        assert_eq!(runner.detection().threshold(), 190.0);
        assert_eq!(runner.step(), FrameOutcome::NoDetection);
    }

    #[test]
    fn failed_reads_are_skipped() {
        let (_tx, rx) = mpsc::channel();
        let mut synthetic = SyntheticSource::new(SourceConfig::default()).with_fail_every(1);
        synthetic.connect().unwrap();
        let detection = DetectionLoop::new(settings()).unwrap();
        let mut runner = SessionRunner::new(detection, Box::new(synthetic), rx, 30).unwrap();
        for _ in 0..3 {
            assert_eq!(
                runner.step(),
                FrameOutcome::Skipped(SkipReason::FrameUnavailable)
            );
        }
    }

    #[test]
    fn zero_fps_rejected() {
        let (_tx, rx) = mpsc::channel();
        let detection = DetectionLoop::new(settings()).unwrap();
        assert!(SessionRunner::new(detection, source(SpotScript::new()), rx, 0).is_err());
    }

    #[test]
    fn stop_returns_session_state() -> Result<()> {
        let (tx, rx) = mpsc::channel();
        let detection = DetectionLoop::new(settings())?;
        let runner = SessionRunner::new(detection, source(SpotScript::new()), rx, 500)?;
        let handle = runner.spawn()?;
        tx.send(Command::BeginCalibration)?;
        tx.send(Command::SetThreshold(205.0))?;
        std::thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());

        let detection = handle.stop()?;
        assert_eq!(detection.mode(), Mode::Calibrating);
        assert_eq!(detection.threshold(), 205.0);
        assert!(detection.ledger().is_empty());
        Ok(())
    }
}
