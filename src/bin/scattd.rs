//! scattd - laser shot tracking daemon
//!
//! This daemon:
//! 1. Loads configuration (SCATT_CONFIG file + SCATT_* overrides)
//! 2. Opens and connects the configured frame source
//! 3. Runs the detection loop on its own thread
//! 4. Reads commands from stdin (calibrate, clear, threshold <v>, export, stats, quit)
//! 5. Logs notifications and writes session exports
//! 6. On Ctrl-C or `quit`, stops at a frame boundary and writes a final export

use anyhow::{anyhow, Result};
use clap::Parser;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use scatt_kernel::{
    open_source, Command, DetectionLoop, DetectionStatus, Mode, Notification, Notifier,
    ScattConfig, SessionExport, SessionRunner,
};

#[derive(Parser, Debug)]
#[command(name = "scattd", about = "Laser shot tracking daemon")]
struct Args {
    /// Path to a JSON or TOML config file
    #[arg(long, env = "SCATT_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ignore stdin (run until Ctrl-C)
    #[arg(long)]
    no_stdin: bool,

    /// Seconds between health log lines
    #[arg(long, default_value_t = 5)]
    health_secs: u64,
}

enum Control {
    Shutdown,
    Export(ExportPurpose),
}

enum ExportPurpose {
    File,
    Stats,
}

/// What the daemon knows about the session, mirrored from notifications.
struct SessionView {
    mode: Mode,
    status: DetectionStatus,
    shots: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ScattConfig::load_from(args.config.as_deref())?;

    let mut source = open_source(&cfg.source)?;
    source.connect()?;

    let (note_tx, note_rx) = mpsc::channel();
    let detection = DetectionLoop::new(cfg.detection.clone())?.with_notifier(Notifier::new(note_tx));

    let (cmd_tx, cmd_rx) = mpsc::channel();
    let handle = SessionRunner::new(detection, source, cmd_rx, cfg.source.target_fps)?.spawn()?;

    log::info!(
        "scattd running. source={} {}x{} @ {} fps, exports to {}",
        cfg.source.url,
        cfg.source.width,
        cfg.source.height,
        cfg.source.target_fps,
        cfg.export_dir.display()
    );

    let (control_tx, control_rx) = mpsc::channel();
    let ctrlc_tx = control_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Control::Shutdown);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    if args.no_stdin {
        log::info!("scattd waiting for shutdown signal (Ctrl-C)...");
    } else {
        log::info!("commands: calibrate | clear | threshold <0-255> | export | stats | quit");
        spawn_stdin_reader(cmd_tx.clone(), control_tx);
    }

    let mut view = SessionView {
        mode: Mode::Idle,
        status: DetectionStatus::Ok,
        shots: 0,
    };
    let mut pending_exports = VecDeque::new();
    let health_interval = Duration::from_secs(args.health_secs.max(1));
    let mut last_health_log = Instant::now();

    loop {
        match control_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Control::Shutdown) => break,
            Ok(Control::Export(purpose)) => {
                // Export snapshots come back in request order.
                pending_exports.push_back(purpose);
                let _ = cmd_tx.send(Command::RequestExport);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        drain_notifications(&note_rx, &mut view, &mut pending_exports, &cfg.export_dir);

        if last_health_log.elapsed() >= health_interval {
            log::info!(
                "scattd health: mode={} status={:?} shots={}",
                view.mode,
                view.status,
                view.shots
            );
            last_health_log = Instant::now();
        }
    }

    log::info!("shutdown signal received, stopping detection loop...");
    let detection = handle.stop()?;
    drain_notifications(&note_rx, &mut view, &mut pending_exports, &cfg.export_dir);

    let stats = detection.stats();
    log::info!(
        "frames processed={} skipped={} failed={} shots recorded={}",
        stats.frames_processed,
        stats.frames_skipped,
        stats.frames_failed,
        stats.shots_recorded
    );
    if detection.ledger().is_empty() {
        log::info!("no shots retained, skipping final export");
    } else {
        let path = detection.export().write_to_dir(&cfg.export_dir)?;
        log::info!("final session export written to {}", path.display());
    }
    Ok(())
}

fn spawn_stdin_reader(commands: Sender<Command>, control: Sender<Control>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.to_ascii_lowercase().as_str() {
                "quit" | "q" | "exit" => {
                    let _ = control.send(Control::Shutdown);
                    return;
                }
                "stats" => {
                    let _ = control.send(Control::Export(ExportPurpose::Stats));
                    continue;
                }
                "export" => {
                    let _ = control.send(Control::Export(ExportPurpose::File));
                    continue;
                }
                _ => {}
            }
            match trimmed.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
        log::debug!("stdin closed");
    });
}

fn drain_notifications(
    notifications: &Receiver<Notification>,
    view: &mut SessionView,
    pending_exports: &mut VecDeque<ExportPurpose>,
    export_dir: &Path,
) {
    for notification in notifications.try_iter() {
        match notification {
            Notification::ModeChanged { to, .. } => {
                if to == Mode::Calibrating {
                    view.shots = 0;
                }
                view.mode = to;
            }
            Notification::DetectionStatus(status) => view.status = status,
            Notification::CalibrationCaptured(_) => {}
            Notification::ShotRecorded(_) => view.shots += 1,
            Notification::ShotsCleared => view.shots = 0,
            Notification::ThresholdChanged(_) => {}
            Notification::ExportReady(export) => {
                match pending_exports.pop_front().unwrap_or(ExportPurpose::File) {
                    ExportPurpose::Stats => log_stats(&export),
                    ExportPurpose::File => match export.write_to_dir(export_dir) {
                        Ok(path) => log::info!(
                            "session export ({} shots) written to {}",
                            export.shot_count,
                            path.display()
                        ),
                        Err(e) => log::error!("session export failed: {:#}", e),
                    },
                }
            }
        }
    }
}

fn log_stats(export: &SessionExport) {
    if export.shot_count == 0 {
        log::info!("stats: no shots");
        return;
    }
    let best = export
        .shots
        .iter()
        .map(|shot| shot.score)
        .fold(0.0, f64::max);
    log::info!(
        "stats: shots={} total={:.1} mean={:.2} best={:.1}",
        export.shot_count,
        export.total_score,
        export.total_score / export.shot_count as f64,
        best
    );
}
