//! Frame ingestion sources.
//!
//! This module provides different sources for decoded frames:
//! - Synthetic laser target (`stub://...`, always available)
//! - Directory of still images (feature: ingest-image)
//!
//! Sources hand out owned `Frame`s one at a time. The detection loop only
//! borrows each frame for a single pass and drops it afterwards, so a source
//! never needs to keep frames alive after `next_frame` returns.
//!
//! A failing `next_frame` is a transient condition. Callers skip the frame and
//! ask again; sources must stay usable after returning an error.

#[cfg(feature = "ingest-image")]
pub mod image_dir;
pub mod synthetic;

#[cfg(feature = "ingest-image")]
pub use image_dir::ImageDirSource;
pub use synthetic::{Spot, SpotScript, SyntheticSource};

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub const DEFAULT_SOURCE_URL: &str = "stub://target";
pub const DEFAULT_FRAME_WIDTH: u32 = 320;
pub const DEFAULT_FRAME_HEIGHT: u32 = 180;
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// Pull-based frame producer.
pub trait FrameSource: Send {
    /// Open the underlying device or stream.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub frames_failed: u64,
    pub url: String,
}

/// Configuration for opening a frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceConfig {
    /// `stub://<name>` for the synthetic target, `file://<dir>` or a plain
    /// directory path for still images.
    pub url: String,
    /// Frame width (synthetic frames only).
    pub width: u32,
    /// Frame height (synthetic frames only).
    pub height: u32,
    /// Pacing hint for the runner, frames per second.
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if self.target_fps == 0 {
            return Err(anyhow!("target_fps must be > 0"));
        }
        Ok(())
    }
}

/// Open the source named by `config.url`. The source is not yet connected.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    config.validate()?;
    if config.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config.clone())));
    }
    if config.url.contains("://") && !config.url.starts_with("file://") {
        return Err(anyhow!("unsupported source url: {}", config.url));
    }
    #[cfg(feature = "ingest-image")]
    {
        Ok(Box::new(ImageDirSource::new(config.clone())?))
    }
    #[cfg(not(feature = "ingest-image"))]
    {
        Err(anyhow!(
            "image directory ingestion requires the ingest-image feature"
        ))
    }
}
