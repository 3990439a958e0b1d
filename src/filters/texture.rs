//! Band-pass (Gabor) texture response.
//!
//! The carrier runs along x (θ = 0), which makes the real kernel the outer
//! product of a modulated Gaussian in x and a plain Gaussian in y, so it is
//! applied as a separable filter.

use std::f32::consts::PI;

use imgref::{ImgRef, ImgVec};

use super::kernel::{Border, correlate_separable};
use crate::raster::Image;

/// Spatial frequency of the Gabor carrier, in cycles per pixel.
pub const GABOR_FREQUENCY: f32 = 0.6;

/// Half-magnitude bandwidth in octaves.
pub const GABOR_BANDWIDTH: f32 = 1.0;

/// Envelope extent in standard deviations.
const GABOR_N_STDS: f32 = 3.0;

/// Gaussian envelope sigma for a given frequency and octave bandwidth.
fn envelope_sigma(frequency: f32, bandwidth: f32) -> f32 {
    let b = 2f32.powf(bandwidth);
    let prefactor = (1.0 / PI) * (2f32.ln() / 2.0).sqrt() * (b + 1.0) / (b - 1.0);
    prefactor / frequency
}

/// Separable factors of the real Gabor kernel.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GaborTaps {
    /// Modulated envelope along x, carrying the `1 / 2πσ²` normalization.
    pub(crate) x: Vec<f32>,
    /// Envelope along y.
    pub(crate) y: Vec<f32>,
}

/// Real part of the Gabor kernel at orientation 0.
pub(crate) fn gabor_kernel(frequency: f32, bandwidth: f32) -> GaborTaps {
    let sigma = envelope_sigma(frequency, bandwidth);
    let half = (GABOR_N_STDS * sigma).max(1.0).ceil() as i32;
    let norm = 1.0 / (2.0 * PI * sigma * sigma);
    let envelope = |t: f32| (-0.5 * t * t / (sigma * sigma)).exp();

    let x = (-half..=half)
        .map(|i| {
            let t = i as f32;
            norm * envelope(t) * (2.0 * PI * frequency * t).cos()
        })
        .collect();
    let y = (-half..=half).map(|i| envelope(i as f32)).collect();
    GaborTaps { x, y }
}

/// Gabor texture response of the luminance, min-max stretched to 8 bits.
#[must_use]
pub fn gabor(image: &Image) -> Image {
    Image::Gray(gabor_plane(image.luma().as_ref()))
}

pub(crate) fn gabor_plane(plane: ImgRef<'_, u8>) -> ImgVec<u8> {
    let taps = gabor_kernel(GABOR_FREQUENCY, GABOR_BANDWIDTH);
    // The real kernel is even in x and y, so correlation equals convolution.
    let response = correlate_separable(plane, &taps.x, &taps.y, Border::Symmetric);
    stretch_to_u8(&response)
}

/// Linearly map `[min, max]` onto `[0, 255]` (truncating); flat input maps to 0.
pub(crate) fn stretch_to_u8(plane: &ImgVec<f32>) -> ImgVec<u8> {
    let (min, max) = plane
        .pixels()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let range = max - min;
    let pixels = plane
        .pixels()
        .map(|v| {
            if range > f32::EPSILON {
                ((v - min) / range * 255.0).clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect();
    ImgVec::new(pixels, plane.width(), plane.height())
}
