use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::Roi;
use crate::ingest::{
    SourceConfig, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_SOURCE_URL,
    DEFAULT_TARGET_FPS,
};
use crate::ledger::DEFAULT_LEDGER_CAPACITY;
use crate::scoring::{ScaleConfig, DEFAULT_CAMERA_PX_PER_MM, DEFAULT_DISPLAY_PX_PER_MM};
use crate::session::{
    DetectionSettings, FrameSkipConfig, DEFAULT_COOLDOWN, DEFAULT_FRAME_BUDGET, DEFAULT_MAX_SKIP,
    DEFAULT_RELAX_AFTER, DEFAULT_ROI, DEFAULT_THRESHOLD,
};

const DEFAULT_EXPORT_DIR: &str = ".";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScattConfigFile {
    threshold: Option<f64>,
    cooldown_ms: Option<u64>,
    roi: Option<RoiConfigFile>,
    scale: Option<ScaleConfigFile>,
    ledger: Option<LedgerConfigFile>,
    frame_skip: Option<FrameSkipConfigFile>,
    source: Option<SourceConfigFile>,
    export: Option<ExportConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RoiConfigFile {
    center_x: Option<u32>,
    center_y: Option<u32>,
    radius: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScaleConfigFile {
    camera_px_per_mm: Option<f64>,
    display_px_per_mm: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LedgerConfigFile {
    capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FrameSkipConfigFile {
    frame_budget_ms: Option<u64>,
    relax_after: Option<u32>,
    max_skip: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ExportConfigFile {
    dir: Option<PathBuf>,
}

/// Daemon configuration: detection parameters, frame source, export target.
#[derive(Debug, Clone, PartialEq)]
pub struct ScattConfig {
    pub detection: DetectionSettings,
    pub source: SourceConfig,
    pub export_dir: PathBuf,
}

impl Default for ScattConfig {
    fn default() -> Self {
        Self {
            detection: DetectionSettings::default(),
            source: SourceConfig::default(),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
        }
    }
}

impl ScattConfig {
    /// File named by `SCATT_CONFIG` (if any), then environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCATT_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScattConfigFile) -> Self {
        let roi = file.roi.unwrap_or_default();
        let scale = file.scale.unwrap_or_default();
        let frame_skip = file.frame_skip.unwrap_or_default();
        let source = file.source.unwrap_or_default();

        let detection = DetectionSettings {
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            roi: Roi {
                center_x: roi.center_x.unwrap_or(DEFAULT_ROI.center_x),
                center_y: roi.center_y.unwrap_or(DEFAULT_ROI.center_y),
                radius: roi.radius.unwrap_or(DEFAULT_ROI.radius),
            },
            cooldown: file
                .cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COOLDOWN),
            scale: ScaleConfig {
                camera_px_per_mm: scale.camera_px_per_mm.unwrap_or(DEFAULT_CAMERA_PX_PER_MM),
                display_px_per_mm: scale
                    .display_px_per_mm
                    .unwrap_or(DEFAULT_DISPLAY_PX_PER_MM),
            },
            ledger_capacity: file
                .ledger
                .and_then(|ledger| ledger.capacity)
                .unwrap_or(DEFAULT_LEDGER_CAPACITY),
            frame_skip: FrameSkipConfig {
                frame_budget: frame_skip
                    .frame_budget_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_FRAME_BUDGET),
                relax_after: frame_skip.relax_after.unwrap_or(DEFAULT_RELAX_AFTER),
                max_skip: frame_skip.max_skip.unwrap_or(DEFAULT_MAX_SKIP),
            },
        };
        let source = SourceConfig {
            url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            width: source.width.unwrap_or(DEFAULT_FRAME_WIDTH),
            height: source.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            target_fps: source.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };
        let export_dir = file
            .export
            .and_then(|export| export.dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR));

        Self {
            detection,
            source,
            export_dir,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("SCATT_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(threshold) = std::env::var("SCATT_THRESHOLD") {
            self.detection.threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCATT_THRESHOLD must be a number"))?;
        }
        if let Ok(cooldown) = std::env::var("SCATT_COOLDOWN_MS") {
            let millis: u64 = cooldown.trim().parse().map_err(|_| {
                anyhow!("SCATT_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
            self.detection.cooldown = Duration::from_millis(millis);
        }
        if let Ok(capacity) = std::env::var("SCATT_LEDGER_CAPACITY") {
            self.detection.ledger_capacity = capacity
                .trim()
                .parse()
                .map_err(|_| anyhow!("SCATT_LEDGER_CAPACITY must be a positive integer"))?;
        }
        if let Ok(dir) = std::env::var("SCATT_EXPORT_DIR") {
            if !dir.trim().is_empty() {
                self.export_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.source.validate()?;
        self.detection
            .roi
            .validate_for(self.source.width, self.source.height)?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScattConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
