//! Structural similarity (SSIM).
//!
//! Sliding-window SSIM with a 7×7 uniform window, `K1 = 0.01`, `K2 = 0.03`,
//! 8-bit data range and sample (unbiased) covariance. Window statistics at
//! the image border use symmetric extension; the final mean skips a
//! 3-pixel margin so that only full windows contribute. RGB images report
//! the mean of the per-channel values.

use imgref::{ImgRef, ImgVec};

use crate::error::{Error, Result};
use crate::filters::kernel::Border;
use crate::raster::Image;

use super::check_same_shape;

/// Side length of the square window.
pub const WINDOW: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Calculate SSIM between two images of identical shape.
///
/// Returns 1.0 for identical images.
///
/// # Errors
///
/// [`Error::ShapeMismatch`] if the shapes differ, [`Error::MetricCalculation`]
/// if either side is smaller than the window.
pub fn calculate_ssim(reference: &Image, candidate: &Image) -> Result<f64> {
    check_same_shape(reference, candidate)?;
    if reference.width() < WINDOW || reference.height() < WINDOW {
        return Err(Error::MetricCalculation {
            metric: "SSIM".to_string(),
            reason: format!(
                "image is {}x{}, smaller than the {WINDOW}x{WINDOW} window",
                reference.width(),
                reference.height()
            ),
        });
    }

    let reference = reference.planes();
    let candidate = candidate.planes();
    let total: f64 = reference
        .iter()
        .zip(&candidate)
        .map(|(r, c)| plane_ssim(r.as_ref(), c.as_ref()))
        .sum();
    Ok(total / reference.len() as f64)
}

fn plane_ssim(x: ImgRef<'_, u8>, y: ImgRef<'_, u8>) -> f64 {
    let (w, h) = (x.width(), x.height());
    let xf: Vec<f64> = x.pixels().map(f64::from).collect();
    let yf: Vec<f64> = y.pixels().map(f64::from).collect();
    let xx: Vec<f64> = xf.iter().map(|v| v * v).collect();
    let yy: Vec<f64> = yf.iter().map(|v| v * v).collect();
    let xy: Vec<f64> = xf.iter().zip(&yf).map(|(a, b)| a * b).collect();

    let ux = uniform_filter(&ImgVec::new(xf, w, h));
    let uy = uniform_filter(&ImgVec::new(yf, w, h));
    let uxx = uniform_filter(&ImgVec::new(xx, w, h));
    let uyy = uniform_filter(&ImgVec::new(yy, w, h));
    let uxy = uniform_filter(&ImgVec::new(xy, w, h));

    let n = (WINDOW * WINDOW) as f64;
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let pad = WINDOW / 2;
    let mut sum = 0.0;
    let mut count = 0usize;
    for row in pad..h - pad {
        for col in pad..w - pad {
            let i = row * w + col;
            let (mx, my) = (ux[i], uy[i]);
            let vx = cov_norm * (uxx[i] - mx * mx);
            let vy = cov_norm * (uyy[i] - my * my);
            let vxy = cov_norm * (uxy[i] - mx * my);

            let numerator = (2.0 * mx * my + c1) * (2.0 * vxy + c2);
            let denominator = (mx * mx + my * my + c1) * (vx + vy + c2);
            sum += numerator / denominator;
            count += 1;
        }
    }
    sum / count as f64
}

/// Separable `WINDOW`-tap box mean with symmetric borders.
fn uniform_filter(src: &ImgVec<f64>) -> Vec<f64> {
    let (w, h) = (src.width(), src.height());
    let buf = src.buf();
    let r = (WINDOW / 2) as isize;
    let scale = 1.0 / WINDOW as f64;

    let mut horizontal = vec![0.0; w * h];
    for y in 0..h {
        let row = &buf[y * w..(y + 1) * w];
        for x in 0..w as isize {
            let acc: f64 = (-r..=r)
                .map(|d| row[Border::Symmetric.index(x + d, w)])
                .sum();
            horizontal[y * w + x as usize] = acc * scale;
        }
    }

    let mut out = vec![0.0; w * h];
    for y in 0..h as isize {
        for x in 0..w {
            let acc: f64 = (-r..=r)
                .map(|d| horizontal[Border::Symmetric.index(y + d, h) * w + x])
                .sum();
            out[y as usize * w + x] = acc * scale;
        }
    }
    out
}
