use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Circular region of interest in frame pixel coordinates.
///
/// Fixed for a session. Pixels whose Euclidean distance from the center is
/// greater than `radius` are never inspected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub center_x: u32,
    pub center_y: u32,
    pub radius: u32,
}

impl Roi {
    pub fn new(center_x: u32, center_y: u32, radius: u32) -> Result<Self> {
        if radius == 0 {
            return Err(anyhow!("roi radius must be > 0"));
        }
        Ok(Self {
            center_x,
            center_y,
            radius,
        })
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x as f64, self.center_y as f64)
    }

    /// True when `(x, y)` lies inside or on the circle.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        let dx = x - self.center_x as i64;
        let dy = y - self.center_y as i64;
        let r = self.radius as i64;
        dx * dx + dy * dy <= r * r
    }

    /// Inclusive bounding box `(x0, y0, x1, y1)` of the circle.
    pub fn bounding_box(&self) -> (i64, i64, i64, i64) {
        let cx = self.center_x as i64;
        let cy = self.center_y as i64;
        let r = self.radius as i64;
        (cx - r, cy - r, cx + r, cy + r)
    }

    /// True when the whole circle lies within a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let (x0, y0, x1, y1) = self.bounding_box();
        x0 >= 0 && y0 >= 0 && x1 < width as i64 && y1 < height as i64
    }

    pub fn validate_for(&self, width: u32, height: u32) -> Result<()> {
        if self.radius == 0 {
            return Err(anyhow!("roi radius must be > 0"));
        }
        if !self.fits_within(width, height) {
            return Err(anyhow!(
                "roi center=({}, {}) radius={} does not fit a {}x{} frame",
                self.center_x,
                self.center_y,
                self.radius,
                width,
                height
            ));
        }
        Ok(())
    }
}
