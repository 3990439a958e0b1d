//! Statistics-based severity approximation.
//!
//! Used whenever the learned scorer cannot produce a result. It looks only
//! at the spread and mean brightness of the grayscale image, so it is a
//! coarse stand-in rather than a diagnostic model.

use tracing::debug;

use super::{ClassificationResult, Provenance, Severity};
use crate::raster::Image;

/// Below this standard deviation an image is graded `No_DR`.
pub const STD_LOW: f64 = 30.0;

/// Below this standard deviation (and at least [`STD_LOW`]) an image is
/// graded `Mild_DR`.
pub const STD_HIGH: f64 = 45.0;

/// High-variance images brighter than this mean are graded `Severe_DR`,
/// the rest `Moderate_DR`.
pub const MEAN_BRIGHT: f64 = 140.0;

/// Mean and population standard deviation of the luminance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStats {
    pub mean: f64,
    pub std_dev: f64,
}

#[must_use]
pub fn intensity_stats(image: &Image) -> IntensityStats {
    let luma = image.luma();
    let n = (luma.width() * luma.height()) as f64;
    let mean = luma.pixels().map(f64::from).sum::<f64>() / n;
    let variance = luma
        .pixels()
        .map(|v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    IntensityStats {
        mean,
        std_dev: variance.sqrt(),
    }
}

/// Grade an image from its intensity statistics.
#[must_use]
pub fn classify_heuristic(image: &Image) -> ClassificationResult {
    let stats = intensity_stats(image);
    let (severity, confidence) = if stats.std_dev < STD_LOW {
        (Severity::NoDr, 0.92)
    } else if stats.std_dev < STD_HIGH {
        (Severity::MildDr, 0.85)
    } else if stats.mean > MEAN_BRIGHT {
        (Severity::SevereDr, 0.78)
    } else {
        (Severity::ModerateDr, 0.72)
    };
    debug!(mean = stats.mean, std_dev = stats.std_dev, label = severity.label(), "heuristic grade");
    ClassificationResult::new(severity, confidence, Provenance::Heuristic)
}
