//! Synthetic laser target (`stub://` URLs).
//!
//! Produces dark frames with at most one red Gaussian spot, either driven by
//! a `SpotScript` or, when no script is given, by a seeded generator that
//! flashes a spot near the frame center at a fixed period. Low background
//! noise keeps the scanner honest without ever reaching the threshold.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::{Frame, PixelFormat};

/// Frames between unscripted flashes (1.5 s at 30 fps).
const FLASH_PERIOD: u64 = 45;
/// Frames each unscripted flash stays lit.
const FLASH_FRAMES: u64 = 3;
/// Maximum distance of an unscripted flash from the frame center, in pixels.
const FLASH_SPREAD_PX: f64 = 12.0;
const DEFAULT_NOISE: u8 = 12;
const DEFAULT_SEED: u64 = 0x5CA7_7A26;

/// A round laser spot with a Gaussian falloff.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spot {
    pub x: f64,
    pub y: f64,
    /// Pixels beyond this distance from the center stay dark.
    pub radius: f64,
    /// Red channel value at the center.
    pub peak: u8,
}

impl Spot {
    pub fn new(x: f64, y: f64, radius: f64, peak: u8) -> Self {
        Self { x, y, radius, peak }
    }

    /// Red channel contribution at pixel `(px, py)`.
    fn intensity_at(&self, px: f64, py: f64) -> f64 {
        let d2 = (px - self.x).powi(2) + (py - self.y).powi(2);
        if d2 > self.radius * self.radius {
            return 0.0;
        }
        let sigma = (self.radius / 2.0).max(0.5);
        self.peak as f64 * (-d2 / (2.0 * sigma * sigma)).exp()
    }
}

#[derive(Clone, Debug)]
struct ScriptStep {
    frames: u64,
    spot: Option<Spot>,
}

/// Frame-indexed spot timeline. Frames past the end of the script are dark.
#[derive(Clone, Debug, Default)]
pub struct SpotScript {
    steps: Vec<ScriptStep>,
}

impl SpotScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `frames` dark frames.
    pub fn dark(mut self, frames: u64) -> Self {
        self.steps.push(ScriptStep { frames, spot: None });
        self
    }

    /// Append `frames` frames showing `spot`.
    pub fn hold(mut self, spot: Spot, frames: u64) -> Self {
        self.steps.push(ScriptStep {
            frames,
            spot: Some(spot),
        });
        self
    }

    pub fn total_frames(&self) -> u64 {
        self.steps.iter().map(|step| step.frames).sum()
    }

    /// Spot shown on the zero-based frame `index`.
    pub fn spot_at(&self, index: u64) -> Option<Spot> {
        let mut start = 0;
        for step in &self.steps {
            if index < start + step.frames {
                return step.spot;
            }
            start += step.frames;
        }
        None
    }
}

/// Render a noise-free frame with an optional spot.
pub fn render_spot_frame(width: u32, height: u32, spot: Option<&Spot>) -> Result<Frame> {
    let mut frame = Frame::filled(width, height, [0, 0, 0])?;
    if let Some(spot) = spot {
        paint_spot(&mut frame, spot);
    }
    Ok(frame)
}

fn paint_spot(frame: &mut Frame, spot: &Spot) {
    let min_x = (spot.x - spot.radius).floor().max(0.0) as u32;
    let min_y = (spot.y - spot.radius).floor().max(0.0) as u32;
    let max_x = ((spot.x + spot.radius).ceil().max(0.0) as u32).min(frame.width() - 1);
    let max_y = ((spot.y + spot.radius).ceil().max(0.0) as u32).min(frame.height() - 1);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let red = spot.intensity_at(x as f64, y as f64).round();
            if red <= 0.0 {
                continue;
            }
            let [r, g, b] = frame.rgb(x, y);
            let red = red.min(255.0) as u8;
            let glow = red / 4;
            frame.put_rgb(x, y, [r.max(red), g.max(glow), b.max(glow)]);
        }
    }
}

/// Synthetic frame source for `stub://` URLs.
pub struct SyntheticSource {
    config: SourceConfig,
    script: Option<SpotScript>,
    rng: StdRng,
    noise: u8,
    fail_every: Option<u64>,
    /// Frames requested so far, including failed ones.
    requested: u64,
    frames_captured: u64,
    frames_failed: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            script: None,
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            noise: DEFAULT_NOISE,
            fail_every: None,
            requested: 0,
            frames_captured: 0,
            frames_failed: 0,
            connected: false,
        }
    }

    /// Replace the periodic flashes with `script`.
    pub fn with_script(mut self, script: SpotScript) -> Self {
        self.script = Some(script);
        self
    }

    /// Per-channel background noise amplitude (0 disables noise).
    pub fn with_noise(mut self, amplitude: u8) -> Self {
        self.noise = amplitude;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Fail every `n`th request (transient read errors). `0` disables.
    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    /// True once a script has been fully played back.
    pub fn script_finished(&self) -> bool {
        self.script
            .as_ref()
            .is_some_and(|script| self.requested >= script.total_frames())
    }

    fn spot_for(&self, index: u64) -> Option<Spot> {
        if let Some(script) = &self.script {
            return script.spot_at(index);
        }
        if index % FLASH_PERIOD < FLASH_PERIOD - FLASH_FRAMES {
            return None;
        }
        // Seeded per period so every frame of one flash shares a position.
        let mut aim = StdRng::seed_from_u64((index / FLASH_PERIOD) ^ DEFAULT_SEED);
        let angle = aim.gen_range(0.0..std::f64::consts::TAU);
        let reach = aim.gen_range(0.0..FLASH_SPREAD_PX);
        Some(Spot::new(
            self.config.width as f64 / 2.0 + reach * angle.cos(),
            self.config.height as f64 / 2.0 + reach * angle.sin(),
            4.0,
            250,
        ))
    }

    fn render(&mut self, spot: Option<Spot>) -> Result<Frame> {
        let (width, height) = (self.config.width, self.config.height);
        let mut data = vec![0u8; width as usize * height as usize * 3];
        if self.noise > 0 {
            // Bulk fill, then fold every byte into [0, noise].
            self.rng.fill(&mut data[..]);
            let span = u16::from(self.noise) + 1;
            for value in data.iter_mut() {
                *value = (u16::from(*value) % span) as u8;
            }
        }
        let mut frame = Frame::new(data, width, height, PixelFormat::Rgb24)?;
        if let Some(spot) = spot {
            paint_spot(&mut frame, &spot);
        }
        Ok(frame)
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("synthetic source {} not connected", self.config.url));
        }
        let index = self.requested;
        self.requested += 1;

        if let Some(n) = self.fail_every {
            if self.requested % n == 0 {
                self.frames_failed += 1;
                return Err(anyhow!("synthetic read failure on frame {}", index));
            }
        }

        let spot = self.spot_for(index);
        let frame = self.render(spot)?;
        self.frames_captured += 1;
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            frames_failed: self.frames_failed,
            url: self.config.url.clone(),
        }
    }
}
