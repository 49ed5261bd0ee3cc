//! Still-image directory frame source.
//!
//! This module provides `ImageDirSource` for replaying PNG/JPEG captures from a
//! local directory (recorded sessions, test fixtures). Files are played in
//! lexical order and the sequence loops once exhausted.
//!
//! The source MUST NOT fetch remote URLs. A file that fails to decode is
//! reported as a failed frame and skipped on the next request.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct ImageDirSource {
    config: SourceConfig,
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frames_captured: u64,
    frames_failed: u64,
}

impl ImageDirSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let dir = local_dir_path(&config.url)?;
        Ok(Self {
            config,
            dir,
            files: Vec::new(),
            cursor: 0,
            frames_captured: 0,
            frames_failed: 0,
        })
    }
}

impl FrameSource for ImageDirSource {
    fn connect(&mut self) -> Result<()> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list image dir {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| is_image_file(path))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(anyhow!("no png/jpeg images in {}", self.dir.display()));
        }
        log::info!(
            "ImageDirSource: connected to {} ({} images)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if self.files.is_empty() {
            return Err(anyhow!("image source {} not connected", self.config.url));
        }
        let path = self.files[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.files.len();

        let frame = image::open(&path)
            .map_err(|e| anyhow!("failed to decode {}: {}", path.display(), e))
            .and_then(|image| Frame::from_rgb_image(image.to_rgb8()));
        match frame {
            Ok(frame) => {
                self.frames_captured += 1;
                Ok(frame)
            }
            Err(e) => {
                self.frames_failed += 1;
                Err(e)
            }
        }
    }

    fn is_healthy(&self) -> bool {
        !self.files.is_empty()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            frames_failed: self.frames_failed,
            url: self.config.url.clone(),
        }
    }
}

fn local_dir_path(url: &str) -> Result<PathBuf> {
    let path = url.strip_prefix("file://").unwrap_or(url);
    if path.trim().is_empty() {
        return Err(anyhow!("image source requires a directory path"));
    }
    if path.contains("://") {
        return Err(anyhow!(
            "image ingestion only supports local paths (no URL schemes)"
        ));
    }
    Ok(PathBuf::from(path))
}

fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
}
