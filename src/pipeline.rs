//! Hybrid enhancement pipeline ("novel" filter).
//!
//! Three fixed stages: smoothing suppresses acquisition noise, CLAHE then
//! lifts local contrast without amplifying that noise, and an edge or
//! texture stage turns the enhanced contrast into structure. The stage
//! choice is a [`HybridVariant`]; every variant is deterministic and returns
//! a grayscale image of the input size.

use std::fmt;
use std::str::FromStr;

use imgref::ImgVec;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::filters::contrast::{ClaheParams, clahe_plane, clahe_with};
use crate::filters::edges::sobel_plane;
use crate::filters::kernel::saturate;
use crate::filters::smoothing::{gaussian, median_plane};
use crate::filters::sobel;
use crate::filters::texture::gabor_plane;
use crate::raster::Image;

/// Weight of the contrast-enhanced image in the blend variant.
const BLEND_CONTRAST_WEIGHT: f32 = 0.6;

/// Weight of the Gabor response in the blend variant.
const BLEND_TEXTURE_WEIGHT: f32 = 0.4;

/// Stage selection for [`HybridFilter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HybridVariant {
    /// Gaussian → CLAHE (clip 3.0, color aware) → Sobel.
    #[default]
    GaussianClaheSobel,
    /// Luminance → median → CLAHE (clip 2.0) → Gabor, blended 60/40 with
    /// the CLAHE output.
    MedianClaheGabor,
    /// Luminance → median → CLAHE (clip 2.0) → Sobel.
    MedianClaheSobel,
}

impl HybridVariant {
    pub const ALL: [Self; 3] = [
        Self::GaussianClaheSobel,
        Self::MedianClaheGabor,
        Self::MedianClaheSobel,
    ];

    /// Configuration identifier, e.g. `gaussian-clahe-sobel`.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::GaussianClaheSobel => "gaussian-clahe-sobel",
            Self::MedianClaheGabor => "median-clahe-gabor",
            Self::MedianClaheSobel => "median-clahe-sobel",
        }
    }

    /// Name used in evaluation reports and output files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::GaussianClaheSobel => "novel_ahref",
            Self::MedianClaheGabor => "novel_blend",
            Self::MedianClaheSobel => "novel_median",
        }
    }
}

impl fmt::Display for HybridVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for HybridVariant {
    type Err = Error;

    /// Accepts either the configuration id or the report name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.id() == wanted || v.name() == wanted)
            .ok_or_else(|| Error::UnknownFilter(s.to_string()))
    }
}

/// The hybrid enhancement filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HybridFilter {
    variant: HybridVariant,
}

impl HybridFilter {
    #[must_use]
    pub fn new(variant: HybridVariant) -> Self {
        Self { variant }
    }

    /// The canonical gaussian → CLAHE → Sobel pipeline.
    #[must_use]
    pub fn canonical() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn variant(&self) -> HybridVariant {
        self.variant
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.variant.name()
    }

    /// Run all three stages.
    #[must_use]
    pub fn apply(&self, image: &Image) -> Image {
        match self.variant {
            HybridVariant::GaussianClaheSobel => {
                let smoothed = gaussian(image);
                let enhanced = clahe_with(&smoothed, ClaheParams::default());
                sobel(&enhanced)
            }
            HybridVariant::MedianClaheGabor => {
                let enhanced = median_then_clahe(image);
                let texture = gabor_plane(enhanced.as_ref());
                let blended = enhanced
                    .pixels()
                    .zip(texture.pixels())
                    .map(|(c, t)| {
                        saturate(
                            BLEND_CONTRAST_WEIGHT * f32::from(c) + BLEND_TEXTURE_WEIGHT * f32::from(t),
                        )
                    })
                    .collect();
                Image::Gray(ImgVec::new(blended, enhanced.width(), enhanced.height()))
            }
            HybridVariant::MedianClaheSobel => {
                let enhanced = median_then_clahe(image);
                Image::Gray(sobel_plane(enhanced.as_ref()))
            }
        }
    }
}

fn median_then_clahe(image: &Image) -> ImgVec<u8> {
    let denoised = median_plane(image.luma().as_ref());
    clahe_plane(denoised.as_ref(), ClaheParams::mild())
}
