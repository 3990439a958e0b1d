//! Quality metrics for comparing a filtered image with its reference.
//!
//! All metrics are pure functions over two images of identical shape:
//!
//! - **MSE**: mean squared sample difference (lower is closer)
//! - **PSNR**: peak signal-to-noise ratio in dB (higher is closer)
//! - **Entropy**: Shannon entropy of the candidate histogram, in bits
//! - **SSIM**: structural similarity, see [`ssim`]
//!
//! | Pair | MSE | PSNR | SSIM |
//! |------|-----|------|------|
//! | identical | 0 | [`PSNR_IDENTICAL`] | 1.0 |
//! | constant offset of 10 | 100 | ≈ 28.13 | < 1.0 |

pub mod ssim;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::Image;

pub use ssim::calculate_ssim;

/// PSNR reported for identical images, where the ratio is unbounded.
pub const PSNR_IDENTICAL: f64 = 100.0;

/// Peak sample value of 8-bit images.
const PEAK: f64 = 255.0;

/// The four scores of one (reference, candidate) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Mean squared error.
    pub mse: f64,
    /// Peak signal-to-noise ratio in dB.
    pub psnr: f64,
    /// Entropy of the candidate, in bits.
    pub entropy: f64,
    /// Structural similarity in [-1, 1].
    pub ssim: f64,
}

impl QualityScore {
    /// Score `candidate` against `reference`.
    pub fn compute(reference: &Image, candidate: &Image) -> Result<Self> {
        let mse = calculate_mse(reference, candidate)?;
        Ok(Self {
            mse,
            psnr: psnr_from_mse(mse),
            entropy: calculate_entropy(candidate),
            ssim: calculate_ssim(reference, candidate)?,
        })
    }
}

/// Fail with [`Error::ShapeMismatch`] unless both images have the same
/// width, height and channel count.
pub(crate) fn check_same_shape(reference: &Image, candidate: &Image) -> Result<()> {
    if reference.shape() != candidate.shape() {
        return Err(Error::ShapeMismatch {
            expected: reference.shape(),
            actual: candidate.shape(),
        });
    }
    Ok(())
}

/// Mean squared per-sample difference, accumulated in `f64`.
pub fn calculate_mse(reference: &Image, candidate: &Image) -> Result<f64> {
    check_same_shape(reference, candidate)?;

    let reference = reference.samples();
    let candidate = candidate.samples();
    let sum: f64 = reference
        .iter()
        .zip(&candidate)
        .map(|(&r, &c)| {
            let diff = f64::from(r) - f64::from(c);
            diff * diff
        })
        .sum();

    Ok(sum / reference.len() as f64)
}

/// PSNR for a given MSE.
///
/// Returns [`PSNR_IDENTICAL`] when `mse` is exactly zero.
#[must_use]
pub fn psnr_from_mse(mse: f64) -> f64 {
    if mse == 0.0 {
        PSNR_IDENTICAL
    } else {
        20.0 * (PEAK / mse.sqrt()).log10()
    }
}

/// Calculate PSNR between two images.
pub fn calculate_psnr(reference: &Image, candidate: &Image) -> Result<f64> {
    calculate_mse(reference, candidate).map(psnr_from_mse)
}

/// Shannon entropy (base 2) of the 256-bin histogram over all samples.
#[must_use]
pub fn calculate_entropy(image: &Image) -> f64 {
    let samples = image.samples();
    let mut histogram = [0u64; 256];
    for &v in &samples {
        histogram[usize::from(v)] += 1;
    }

    let total = samples.len() as f64;
    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: usize, height: usize) -> Image {
        let data = (0..width * height).map(|i| (i * 7 % 256) as u8).collect();
        Image::from_gray(data, width, height).unwrap()
    }

    #[test]
    fn test_psnr_identical() {
        let img = gradient(32, 32);
        assert_eq!(calculate_psnr(&img, &img).unwrap(), PSNR_IDENTICAL);
        assert_eq!(calculate_mse(&img, &img).unwrap(), 0.0);
    }

    #[test]
    fn test_psnr_different() {
        let reference = Image::from_gray(vec![100; 100 * 100], 100, 100).unwrap();
        let test = Image::from_gray(vec![110; 100 * 100], 100, 100).unwrap();
        assert_eq!(calculate_mse(&reference, &test).unwrap(), 100.0);
        let psnr = calculate_psnr(&reference, &test).unwrap();
        // 20 * log10(255 / 10) ≈ 28.13
        assert!((psnr - 28.1308).abs() < 1e-3, "psnr was {psnr}");
    }

    #[test]
    fn test_mse_has_no_wraparound() {
        let reference = Image::from_gray(vec![0; 16], 4, 4).unwrap();
        let test = Image::from_gray(vec![255; 16], 4, 4).unwrap();
        assert_eq!(calculate_mse(&reference, &test).unwrap(), 65025.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let err = calculate_mse(&gradient(8, 8), &gradient(8, 9)).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: (8, 8, 1),
                actual: (8, 9, 1)
            }
        ));

        let rgb = Image::from_rgb(&[0; 8 * 8 * 3], 8, 8).unwrap();
        assert!(matches!(
            QualityScore::compute(&gradient(8, 8), &rgb),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_entropy() {
        let flat = Image::from_gray(vec![42; 64], 8, 8).unwrap();
        assert_eq!(calculate_entropy(&flat), 0.0);

        let two_levels: Vec<u8> = (0..64).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
        let img = Image::from_gray(two_levels, 8, 8).unwrap();
        assert!((calculate_entropy(&img) - 1.0).abs() < 1e-12);

        let all_levels: Vec<u8> = (0..=255).collect();
        let img = Image::from_gray(all_levels, 16, 16).unwrap();
        assert!((calculate_entropy(&img) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_quality_score_identity() {
        let img = gradient(20, 20);
        let score = QualityScore::compute(&img, &img).unwrap();
        assert_eq!(score.mse, 0.0);
        assert_eq!(score.psnr, PSNR_IDENTICAL);
        assert_eq!(score.ssim, 1.0);
        assert!(score.entropy > 0.0);
    }
}
