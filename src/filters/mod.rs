//! Filter bank: single-purpose 8-bit image transforms.
//!
//! Every filter is a pure function `&Image -> Image` with fixed parameters.
//! Smoothing filters and CLAHE keep the channel count; edge and texture
//! filters work on the luminance projection and return grayscale.
//!
//! | Name | Module | Output |
//! |------|--------|--------|
//! | `mean`, `median`, `gaussian`, `bilateral` | [`smoothing`] | same channels |
//! | `sobel`, `prewitt`, `laplacian` | [`edges`] | grayscale |
//! | `gabor` | [`texture`] | grayscale |
//! | `clahe` | [`contrast`] | same channels |

pub mod contrast;
pub mod edges;
pub(crate) mod kernel;
pub mod smoothing;
pub mod texture;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::raster::Image;

pub use contrast::{ClaheParams, clahe, clahe_with};
pub use edges::{laplacian, prewitt, sobel};
pub use smoothing::{bilateral, gaussian, mean, median};
pub use texture::gabor;

/// The filters of the bank, in report registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Mean,
    Median,
    Gaussian,
    Bilateral,
    Sobel,
    Prewitt,
    Laplacian,
    Gabor,
    Clahe,
}

impl FilterKind {
    /// Every filter, in registration order.
    pub const ALL: [Self; 9] = [
        Self::Mean,
        Self::Median,
        Self::Gaussian,
        Self::Bilateral,
        Self::Sobel,
        Self::Prewitt,
        Self::Laplacian,
        Self::Gabor,
        Self::Clahe,
    ];

    /// Report and file name of this filter.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Gaussian => "gaussian",
            Self::Bilateral => "bilateral",
            Self::Sobel => "sobel",
            Self::Prewitt => "prewitt",
            Self::Laplacian => "laplacian",
            Self::Gabor => "gabor",
            Self::Clahe => "clahe",
        }
    }

    /// Whether the output is always grayscale regardless of input.
    #[must_use]
    pub fn reduces_to_gray(self) -> bool {
        matches!(self, Self::Sobel | Self::Prewitt | Self::Laplacian | Self::Gabor)
    }

    /// Run the filter.
    #[must_use]
    pub fn apply(self, image: &Image) -> Image {
        match self {
            Self::Mean => mean(image),
            Self::Median => median(image),
            Self::Gaussian => gaussian(image),
            Self::Bilateral => bilateral(image),
            Self::Sobel => sobel(image),
            Self::Prewitt => prewitt(image),
            Self::Laplacian => laplacian(image),
            Self::Gabor => gabor(image),
            Self::Clahe => clahe(image),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| Error::UnknownFilter(s.to_string()))
    }
}
