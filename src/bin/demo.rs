//! demo - end-to-end scripted session for the shot tracking kernel
//!
//! Plays a synthetic target through the real detection loop: one calibration
//! spot followed by a string of shots scattered around the aim point. Frame
//! times advance on a simulated clock so the cooldown behaves as it would at
//! the configured frame rate.

use anyhow::{anyhow, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use scatt_kernel::ingest::{Spot, SpotScript};
use scatt_kernel::{
    Command, DetectionLoop, DetectionSettings, FrameOutcome, FrameSource, SessionExport,
    SourceConfig, SyntheticSource,
};

/// Where the demo shooter's laser lands when aimed at the center.
const CALIBRATION_POINT: (f64, f64) = (163.0, 87.0);
const SPOT_RADIUS: f64 = 3.5;
const SPOT_PEAK: u8 = 250;
/// Frames a shot stays lit (shorter than the cooldown at 30 fps).
const SHOT_FRAMES: u64 = 4;
/// Dark frames between shots (longer than the cooldown at 30 fps).
const GAP_FRAMES: u64 = 15;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of shots to fire after calibration.
    #[arg(long, default_value_t = 10)]
    shots: u32,
    /// Simulated frames per second.
    #[arg(long, default_value_t = 30)]
    fps: u32,
    /// Largest miss from the aim point, in camera pixels.
    #[arg(long, default_value_t = 12.0)]
    spread: f64,
    /// Output directory for the session export.
    #[arg(long, default_value = "demo_out")]
    out: String,
    /// Optional deterministic seed for shot placement.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }
    if !args.spread.is_finite() || args.spread < 0.0 {
        return Err(anyhow!("spread must be a non-negative number"));
    }

    stage("build target script");
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (aim_x, aim_y) = CALIBRATION_POINT;
    let mut script = SpotScript::new()
        .dark(GAP_FRAMES)
        .hold(Spot::new(aim_x, aim_y, SPOT_RADIUS, SPOT_PEAK), SHOT_FRAMES);
    for _ in 0..args.shots {
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let reach = args.spread * rng.gen::<f64>().sqrt();
        let spot = Spot::new(
            aim_x + reach * angle.cos(),
            aim_y + reach * angle.sin(),
            SPOT_RADIUS,
            SPOT_PEAK,
        );
        script = script.dark(GAP_FRAMES).hold(spot, SHOT_FRAMES);
    }

    stage("open synthetic source");
    let mut source = SyntheticSource::new(SourceConfig {
        url: "stub://demo".to_string(),
        target_fps: args.fps,
        ..SourceConfig::default()
    })
    .with_script(script)
    .with_seed(args.seed.unwrap_or_default());
    source.connect()?;

    stage("run detection loop");
    let mut detection = DetectionLoop::new(DetectionSettings::default())?;
    detection.handle_command(Command::BeginCalibration)?;

    let frame_interval = Duration::from_secs(1) / args.fps;
    let start = Instant::now();
    let mut index: u32 = 0;
    while !source.script_finished() {
        let now = start + frame_interval * index;
        let frame_no = index;
        index += 1;
        let outcome = match source.next_frame() {
            Ok(frame) => detection.process_frame_at(&frame, now),
            Err(e) => {
                eprintln!("demo: frame {} unavailable: {}", frame_no, e);
                continue;
            }
        };
        match outcome {
            FrameOutcome::Calibrated(reference) => println!(
                "calibrated: offset ({:+.2}, {:+.2}) px",
                reference.offset_x, reference.offset_y
            ),
            FrameOutcome::ShotRecorded(shot) => println!(
                "shot {:>2}: {:>4.1}  ring {:>2}  ({:>5.1} mm, dx={:+7.1} dy={:+7.1})",
                shot.sequence(),
                shot.score(),
                shot.ring().map_or_else(|| "-".to_string(), |ring| ring.to_string()),
                shot.distance_mm(),
                shot.dx(),
                shot.dy()
            ),
            _ => {}
        }
    }

    stage("write session export");
    let out_dir = PathBuf::from(&args.out);
    let export = detection.export();
    let export_path = export.write_to_dir(&out_dir)?;

    stage("verify session export");
    let verify_result = SessionExport::read(&export_path).and_then(|read_back| {
        read_back.verify()?;
        if read_back.shot_count != export.shot_count {
            return Err(anyhow!(
                "export lost shots: wrote {}, read {}",
                export.shot_count,
                read_back.shot_count
            ));
        }
        Ok(())
    });

    let stats = detection.ledger().stats();
    let loop_stats = detection.stats();
    println!("demo summary:");
    println!("  frames processed: {}", loop_stats.frames_processed);
    println!("  frames skipped: {}", loop_stats.frames_skipped);
    println!("  shots recorded: {}", stats.count);
    println!("  total score: {:.1}", stats.total);
    println!("  mean score: {:.2}", stats.mean);
    println!("  best score: {:.1}", stats.best);
    println!("  session export: {}", export_path.display());
    println!(
        "  verify: {}",
        if verify_result.is_ok() { "OK" } else { "FAIL" }
    );
    println!("next steps:");
    println!(
        "  cargo run --bin session_verify -- --file {}",
        export_path.display()
    );

    verify_result
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
