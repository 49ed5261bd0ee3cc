//! ROI peak scan.
//!
//! Pixels are visited in row-major raster order: rows top to bottom, and
//! left to right within a row. A pixel replaces the current peak only when it
//! is strictly brighter, so on equal brightness the first-encountered pixel
//! wins.

use crate::detect::result::PeakPixel;
use crate::detect::roi::Roi;
use crate::frame::Frame;

/// Find the brightest pixel inside `roi` whose brightness exceeds `threshold`.
///
/// Returns `None` when no pixel in the circle qualifies. Only the part of the
/// circle's bounding box that overlaps the frame is visited.
pub fn scan(frame: &Frame, roi: &Roi, threshold: f64) -> Option<PeakPixel> {
    let (x0, y0, x1, y1) = roi.bounding_box();
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(frame.width() as i64 - 1);
    let y1 = y1.min(frame.height() as i64 - 1);

    let mut peak: Option<PeakPixel> = None;
    for y in y0..=y1 {
        for x in x0..=x1 {
            if !roi.contains(x, y) {
                continue;
            }
            let (px, py) = (x as u32, y as u32);
            let brightness = frame.brightness(px, py);
            if f64::from(brightness) <= threshold {
                continue;
            }
            if peak.map_or(true, |p| brightness > p.brightness) {
                peak = Some(PeakPixel {
                    x: px,
                    y: py,
                    brightness,
                });
            }
        }
    }
    peak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_frame() -> Frame {
        Frame::filled(320, 180, [12, 8, 10]).unwrap()
    }

    fn roi() -> Roi {
        Roi::new(160, 90, 40).unwrap()
    }

    #[test]
    fn nothing_above_threshold_yields_none() {
        let mut frame = dark_frame();
        frame.put_rgb(160, 90, [220, 10, 10]);
        // Equal to the threshold does not qualify.
        assert_eq!(scan(&frame, &roi(), 220.0), None);
    }

    #[test]
    fn finds_brightest_pixel() {
        let mut frame = dark_frame();
        frame.put_rgb(150, 80, [230, 0, 0]);
        frame.put_rgb(165, 95, [10, 250, 0]);
        let peak = scan(&frame, &roi(), 220.0).unwrap();
        assert_eq!((peak.x, peak.y, peak.brightness), (165, 95, 250));
    }

    #[test]
    fn pixels_outside_circle_are_ignored() {
        let mut frame = dark_frame();
        // Inside the bounding box corner but outside the circle.
        frame.put_rgb(125, 55, [255, 255, 255]);
        // Outside the bounding box entirely.
        frame.put_rgb(10, 10, [255, 255, 255]);
        assert_eq!(scan(&frame, &roi(), 100.0), None);
    }

    #[test]
    fn ties_resolve_to_first_in_raster_order() {
        let mut frame = dark_frame();
        frame.put_rgb(170, 100, [240, 0, 0]);
        frame.put_rgb(150, 100, [240, 0, 0]);
        frame.put_rgb(175, 85, [240, 0, 0]);
        let peak = scan(&frame, &roi(), 200.0).unwrap();
        // Row 85 comes before row 100.
        assert_eq!((peak.x, peak.y), (175, 85));

        let mut frame = dark_frame();
        frame.put_rgb(170, 100, [240, 0, 0]);
        frame.put_rgb(150, 100, [240, 0, 0]);
        let peak = scan(&frame, &roi(), 200.0).unwrap();
        assert_eq!((peak.x, peak.y), (150, 100));
    }

    #[test]
    fn roi_overhanging_frame_is_clipped() {
        let mut frame = Frame::filled(20, 20, [0, 0, 0]).unwrap();
        frame.put_rgb(0, 0, [255, 0, 0]);
        let roi = Roi::new(2, 2, 5).unwrap();
        let peak = scan(&frame, &roi, 100.0).unwrap();
        assert_eq!((peak.x, peak.y), (0, 0));
    }
}
