//! Sub-pixel centroid refinement with temporal smoothing.
//!
//! Around the scan peak, a square window is accumulated with weight
//! `brightness²`. The window shrinks for saturated peaks (blooming makes the
//! bright core wider than the spot itself). Pixels dimmer than
//! `NOISE_FLOOR_FRACTION` of the peak are left out.

use crate::detect::result::{Centroid, PeakPixel};
use crate::detect::roi::Roi;
use crate::frame::Frame;

/// Share of the freshly computed centroid in the blended output.
pub const SMOOTHING_NEW_WEIGHT: f64 = 0.6;

/// Pixels below this fraction of the peak brightness do not contribute.
pub const NOISE_FLOOR_FRACTION: f64 = 0.7;

/// Half-width of the accumulation window for a given peak brightness.
pub fn window_half_width(peak_brightness: u8) -> i64 {
    match peak_brightness {
        b if b > 240 => 2,
        b if b > 200 => 3,
        _ => 4,
    }
}

/// Intensity-weighted centroid around `peak`, restricted to the ROI circle
/// and the frame. `None` when no pixel carries weight.
pub fn weighted_centroid(frame: &Frame, peak: &PeakPixel, roi: &Roi) -> Option<Centroid> {
    let half = window_half_width(peak.brightness);
    let floor = f64::from(peak.brightness) * NOISE_FLOOR_FRACTION;

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_w = 0.0;
    for dy in -half..=half {
        for dx in -half..=half {
            let x = peak.x as i64 + dx;
            let y = peak.y as i64 + dy;
            if !frame.contains(x, y) || !roi.contains(x, y) {
                continue;
            }
            let brightness = f64::from(frame.brightness(x as u32, y as u32));
            if brightness < floor {
                continue;
            }
            let weight = brightness * brightness;
            sum_x += x as f64 * weight;
            sum_y += y as f64 * weight;
            sum_w += weight;
        }
    }

    if sum_w == 0.0 {
        return None;
    }
    Some(Centroid::new(sum_x / sum_w, sum_y / sum_w))
}

/// Stateful refiner: weighted centroid followed by an exponential moving
/// average against the previous output.
#[derive(Clone, Debug, Default)]
pub struct CentroidRefiner {
    previous: Option<Centroid>,
}

impl CentroidRefiner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self) -> Option<Centroid> {
        self.previous
    }

    pub fn refine(&mut self, frame: &Frame, peak: &PeakPixel, roi: &Roi) -> Centroid {
        let Some(computed) = weighted_centroid(frame, peak, roi) else {
            // Zero total weight: report the raw peak, history untouched.
            return Centroid::from(*peak);
        };

        let blended = match self.previous {
            Some(prev) => Centroid::new(
                blend(computed.x, prev.x),
                blend(computed.y, prev.y),
            ),
            None => computed,
        };
        self.previous = Some(blended);
        blended
    }
}

// Same as `0.6 * new + 0.4 * previous`, written as a step towards `new` so a
// steady input is reproduced exactly.
fn blend(new: f64, previous: f64) -> f64 {
    previous + (new - previous) * SMOOTHING_NEW_WEIGHT
}
