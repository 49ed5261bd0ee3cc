mod backend;
pub mod centroid;
mod result;
mod roi;
pub mod scan;

pub use backend::{RoiSpotDetector, SpotDetector};
pub use centroid::CentroidRefiner;
pub use result::{Centroid, PeakPixel};
pub use roi::Roi;
pub use scan::scan;
