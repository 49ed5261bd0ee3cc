use crate::detect::centroid::CentroidRefiner;
use crate::detect::result::Centroid;
use crate::detect::roi::Roi;
use crate::detect::scan::scan;
use crate::frame::Frame;

/// Spot detector seam used by the detection loop.
///
/// Implementations receive a borrowed frame for the duration of one call and
/// return at most one sub-pixel position. They must not retain the frame.
pub trait SpotDetector: Send {
    /// Detector identifier (for logs).
    fn name(&self) -> &'static str;

    /// Locate the spot inside `roi`, or `None` when nothing exceeds `threshold`.
    fn detect(&mut self, frame: &Frame, roi: &Roi, threshold: f64) -> Option<Centroid>;
}

/// ROI peak scan followed by centroid refinement and smoothing.
#[derive(Clone, Debug, Default)]
pub struct RoiSpotDetector {
    refiner: CentroidRefiner,
}

impl RoiSpotDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refiner(&self) -> &CentroidRefiner {
        &self.refiner
    }
}

impl SpotDetector for RoiSpotDetector {
    fn name(&self) -> &'static str {
        "roi-centroid"
    }

    fn detect(&mut self, frame: &Frame, roi: &Roi, threshold: f64) -> Option<Centroid> {
        let peak = scan(frame, roi, threshold)?;
        Some(self.refiner.refine(frame, &peak, roi))
    }
}
