//! Calibration reference: where the laser lands when aimed at target center.

use serde::{Deserialize, Serialize};

use crate::detect::{Centroid, Roi};

/// Offset of the calibrated aim point from the ROI center, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReference {
    pub offset_x: f64,
    pub offset_y: f64,
}

impl CalibrationReference {
    pub fn from_centroid(centroid: Centroid, roi: &Roi) -> Self {
        let (cx, cy) = roi.center();
        Self {
            offset_x: centroid.x - cx,
            offset_y: centroid.y - cy,
        }
    }

    /// Absolute frame position of the aim point for `roi`.
    pub fn aim_point(&self, roi: &Roi) -> Centroid {
        let (cx, cy) = roi.center();
        Centroid::new(cx + self.offset_x, cy + self.offset_y)
    }
}

/// Holds the current reference. Empty until the first calibration capture.
#[derive(Clone, Debug, Default)]
pub struct CalibrationStore {
    reference: Option<CalibrationReference>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&self) -> Option<CalibrationReference> {
        self.reference
    }

    pub fn is_calibrated(&self) -> bool {
        self.reference.is_some()
    }

    pub fn capture(&mut self, centroid: Centroid, roi: &Roi) -> CalibrationReference {
        let reference = CalibrationReference::from_centroid(centroid, roi);
        self.reference = Some(reference);
        reference
    }

    pub fn clear(&mut self) {
        self.reference = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_stores_offset_from_roi_center() {
        let roi = Roi::new(160, 90, 40).unwrap();
        let mut store = CalibrationStore::new();
        assert!(!store.is_calibrated());

        let reference = store.capture(Centroid::new(152.5, 97.0), &roi);
        assert_eq!(reference.offset_x, -7.5);
        assert_eq!(reference.offset_y, 7.0);
        assert_eq!(store.reference(), Some(reference));
        assert_eq!(reference.aim_point(&roi), Centroid::new(152.5, 97.0));

        store.clear();
        assert_eq!(store.reference(), None);
    }
}
