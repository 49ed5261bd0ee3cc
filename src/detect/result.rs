use serde::{Deserialize, Serialize};

/// Brightest qualifying pixel found by the ROI scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeakPixel {
    pub x: u32,
    pub y: u32,
    /// `max(R, G, B)` of the pixel.
    pub brightness: u8,
}

/// Sub-pixel spot position in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<PeakPixel> for Centroid {
    fn from(peak: PeakPixel) -> Self {
        Self {
            x: peak.x as f64,
            y: peak.y as f64,
        }
    }
}
