//! session_verify - Check an exported session document.
//!
//! This tool proves:
//! - The file parses as a session export (field names and types)
//! - `shotCount` matches the listed shots
//! - Every score lies in [0, 10] with at most one decimal
//! - `totalScore` equals the rounded sum of the listed scores

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use scatt_kernel::SessionExport;

#[derive(Parser, Debug)]
#[command(name = "session_verify", about = "Verify an exported session document")]
struct Args {
    /// Path to a scatt_session_<date>.json file
    #[arg(long, value_name = "PATH")]
    file: PathBuf,

    /// Print every shot
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    println!("session_verify: checking {}", args.file.display());
    println!();

    let export = SessionExport::read(&args.file)?;
    if args.verbose {
        for (i, shot) in export.shots.iter().enumerate() {
            println!(
                "  shot {:>3}: score={:>4.1} dx={:+.1} dy={:+.1}",
                i + 1,
                shot.score,
                shot.dx,
                shot.dy
            );
        }
        println!();
    }

    export
        .verify()
        .map_err(|e| anyhow!("INVALID: {}", e))?;

    println!("recorded at {}", export.timestamp.to_rfc3339());
    println!(
        "{} shots, total {:.1}",
        export.shot_count, export.total_score
    );
    println!("OK: session export verified.");
    Ok(())
}
