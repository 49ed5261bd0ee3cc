//! Decoded frame container.
//!
//! A `Frame` owns the pixel buffer for one decoded video frame. The detection
//! pipeline only ever borrows it (`&Frame`) for the duration of a single pass:
//!
//! - Pixel bytes are private; reads go through `rgb()` / `brightness()`.
//! - There is no `Clone`: the capture side owns the buffer for its lifetime.
//! - RGB and RGBA layouts are accepted; alpha is ignored.

use anyhow::{anyhow, Result};

/// Pixel layout of a decoded buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed 8-bit R, G, B.
    Rgb24,
    /// Packed 8-bit R, G, B, A (alpha ignored).
    Rgba32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }
}

/// One decoded frame. Immutable once constructed.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

// Explicitly NOT implementing Clone: a frame is handed over, not duplicated.

impl Frame {
    /// Wrap a decoded buffer, validating its length against the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero ({}x{})", width, height));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(format.bytes_per_pixel()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "{:?} frame length mismatch: expected {}, got {}",
                format,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            format,
        })
    }

    /// A frame where every pixel has the same colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let pixel_count = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        let data = rgb.repeat(pixel_count);
        Self::new(data, width, height, PixelFormat::Rgb24)
    }

    #[cfg(feature = "ingest-image")]
    pub fn from_rgb_image(image: image::RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, PixelFormat::Rgb24)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// True when the signed coordinate addresses a pixel of this frame.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Red, green and blue intensities at `(x, y)`.
    ///
    /// Callers must stay within `width()` x `height()`.
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let offset = self.offset(x, y);
        [
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ]
    }

    /// Brightness of a pixel: the strongest of its three channels.
    pub fn brightness(&self, x: u32, y: u32) -> u8 {
        let [r, g, b] = self.rgb(x, y);
        r.max(g).max(b)
    }

    /// Overwrite one pixel. Only capture-side code (sources, test fixtures)
    /// builds frames; the detection pipeline never holds a `&mut Frame`.
    pub(crate) fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let offset = self.offset(x, y);
        self.data[offset..offset + 3].copy_from_slice(&rgb);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel payloads are never dumped into logs.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        assert!(Frame::new(vec![0u8; 10], 2, 2, PixelFormat::Rgb24).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgba32).is_err());
        assert!(Frame::new(vec![0u8; 16], 2, 2, PixelFormat::Rgba32).is_ok());
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(Frame::new(vec![], 0, 4, PixelFormat::Rgb24).is_err());
    }

    #[test]
    fn brightness_is_max_channel() -> Result<()> {
        let frame = Frame::new(vec![10, 200, 30, 255, 1, 2, 3, 0], 2, 1, PixelFormat::Rgba32)?;
        assert_eq!(frame.brightness(0, 0), 200);
        // Alpha does not count towards brightness.
        assert_eq!(frame.brightness(1, 0), 3);
        Ok(())
    }

    #[test]
    fn put_rgb_addresses_row_major() -> Result<()> {
        let mut frame = Frame::filled(4, 3, [0, 0, 0])?;
        frame.put_rgb(2, 1, [9, 250, 4]);
        assert_eq!(frame.rgb(2, 1), [9, 250, 4]);
        assert_eq!(frame.brightness(1, 2), 0);
        assert!(frame.contains(3, 2));
        assert!(!frame.contains(4, 0));
        assert!(!frame.contains(-1, 0));
        Ok(())
    }
}
