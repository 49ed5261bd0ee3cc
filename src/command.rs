//! Command channel vocabulary.
//!
//! External handlers never touch session state directly: they send a
//! `Command`, and the detection loop applies it between frames. Results flow
//! back as `Notification`s through a fire-and-forget `Notifier`.

use anyhow::{anyhow, Result};
use std::str::FromStr;
use std::sync::mpsc::Sender;

use crate::calibration::CalibrationReference;
use crate::export::SessionExport;
use crate::scoring::Shot;
use crate::session::Mode;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Clear calibration and shots, then wait for a calibration spot.
    BeginCalibration,
    /// Empty the shot ledger; calibration is kept.
    ClearShots,
    /// Change the sensitivity threshold (clamped to [0, 255]).
    SetThreshold(f64),
    /// Emit a `Notification::ExportReady` snapshot.
    RequestExport,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    /// Line syntax used by the daemon's stdin channel.
    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let command = match verb.as_str() {
            "calibrate" | "c" => Command::BeginCalibration,
            "clear" => Command::ClearShots,
            "export" => Command::RequestExport,
            "threshold" | "t" => {
                let raw = parts
                    .next()
                    .ok_or_else(|| anyhow!("threshold requires a value"))?;
                let value: f64 = raw
                    .parse()
                    .map_err(|_| anyhow!("threshold value '{}' is not a number", raw))?;
                Command::SetThreshold(value)
            }
            other => return Err(anyhow!("unknown command '{}'", other)),
        };
        if let Some(extra) = parts.next() {
            return Err(anyhow!("unexpected argument '{}'", extra));
        }
        Ok(command)
    }
}

/// Health of the detection stream as reported to the outside.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionStatus {
    Ok,
    /// Calibrating with no qualifying spot yet. Informational, not a failure.
    AwaitingCalibration,
    /// Frames are currently being skipped.
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    ModeChanged { from: Mode, to: Mode },
    CalibrationCaptured(CalibrationReference),
    ShotRecorded(Shot),
    ShotsCleared,
    ThresholdChanged(f64),
    DetectionStatus(DetectionStatus),
    ExportReady(SessionExport),
}

/// Fire-and-forget notification sink. A missing or hung-up receiver is
/// ignored so emission never stalls the detection cadence.
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    tx: Option<Sender<Notification>>,
}

impl Notifier {
    pub fn new(tx: Sender<Notification>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn emit(&self, notification: Notification) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(notification);
        }
    }
}
