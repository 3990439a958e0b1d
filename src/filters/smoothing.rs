//! Noise-suppressing filters: box mean, median, Gaussian and bilateral.
//!
//! All four work per channel on color input and keep the image shape.
//! Mean, Gaussian and median run on `imageproc`; the bilateral filter is
//! computed here because it weights neighbours by the summed difference
//! over all channels at once, inside a disc rather than a square.

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

use super::kernel::{self, Border, correlate_separable, saturate, to_u8};
use crate::raster::Image;

/// Neighbourhood size of the mean, median and Gaussian filters.
pub const SMOOTHING_SIZE: usize = 5;

/// Bilateral filter diameter in pixels.
pub const BILATERAL_DIAMETER: usize = 9;

/// Bilateral range (intensity) sigma.
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;

/// Bilateral spatial sigma.
pub const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Binomial approximation used for a 5-tap Gaussian with automatic sigma.
const GAUSSIAN_5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

const BOX_5: [f32; SMOOTHING_SIZE] = [1.0 / SMOOTHING_SIZE as f32; SMOOTHING_SIZE];

/// 5×5 box average.
#[must_use]
pub fn mean(image: &Image) -> Image {
    image.map_planes(|plane| {
        to_u8(
            &correlate_separable(plane, &BOX_5, &BOX_5, Border::Reflect101),
            saturate,
        )
    })
}

/// 5×5 Gaussian blur.
#[must_use]
pub fn gaussian(image: &Image) -> Image {
    image.map_planes(gaussian_plane)
}

pub(crate) fn gaussian_plane(plane: ImgRef<'_, u8>) -> ImgVec<u8> {
    to_u8(
        &correlate_separable(plane, &GAUSSIAN_5, &GAUSSIAN_5, Border::Reflect101),
        saturate,
    )
}

/// 5×5 median, edges replicated.
#[must_use]
pub fn median(image: &Image) -> Image {
    image.map_planes(median_plane)
}

pub(crate) fn median_plane(plane: ImgRef<'_, u8>) -> ImgVec<u8> {
    kernel::median(plane, (SMOOTHING_SIZE / 2) as u32)
}

/// Edge-preserving bilateral filter.
///
/// Neighbours within a disc of radius `BILATERAL_DIAMETER / 2` are weighted
/// by `exp(-r²/2σs²) · exp(-Δ²/2σc²)`, where Δ is the sum of absolute
/// per-channel differences, so color pixels share one weight across
/// channels.
#[must_use]
pub fn bilateral(image: &Image) -> Image {
    let offsets = disc_offsets();
    let color_weights = color_weight_table(image.channels());
    match image {
        Image::Gray(img) => Image::Gray(bilateral_gray(img.as_ref(), &offsets, &color_weights)),
        Image::Rgb(img) => Image::Rgb(bilateral_rgb(img.as_ref(), &offsets, &color_weights)),
    }
}

/// Spatial offsets inside the filter disc with their weights.
fn disc_offsets() -> Vec<(isize, isize, f32)> {
    let radius = (BILATERAL_DIAMETER / 2) as isize;
    let coeff = -0.5 / (BILATERAL_SIGMA_SPACE * BILATERAL_SIGMA_SPACE);
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2.sqrt() > radius as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * coeff).exp()));
        }
    }
    offsets
}

fn color_weight_table(channels: usize) -> Vec<f32> {
    let coeff = -0.5 / (BILATERAL_SIGMA_COLOR * BILATERAL_SIGMA_COLOR);
    (0..=255 * channels)
        .map(|d| {
            let d = d as f32;
            (d * d * coeff).exp()
        })
        .collect()
}

fn bilateral_gray(
    src: ImgRef<'_, u8>,
    offsets: &[(isize, isize, f32)],
    color_weights: &[f32],
) -> ImgVec<u8> {
    let (w, h, stride) = (src.width(), src.height(), src.stride());
    let buf: &[u8] = src.buf();
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h as isize {
        for x in 0..w as isize {
            let centre = buf[y as usize * stride + x as usize];
            let (mut sum, mut wsum) = (0.0f32, 0.0f32);
            for &(dx, dy, ws) in offsets {
                let v = buf[Border::Reflect101.index(y + dy, h) * stride
                    + Border::Reflect101.index(x + dx, w)];
                let weight = ws * color_weights[usize::from(v.abs_diff(centre))];
                sum += weight * f32::from(v);
                wsum += weight;
            }
            out.push(saturate(sum / wsum));
        }
    }
    ImgVec::new(out, w, h)
}

fn bilateral_rgb(
    src: ImgRef<'_, RGB8>,
    offsets: &[(isize, isize, f32)],
    color_weights: &[f32],
) -> ImgVec<RGB8> {
    let (w, h, stride) = (src.width(), src.height(), src.stride());
    let buf: &[RGB8] = src.buf();
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h as isize {
        for x in 0..w as isize {
            let c = buf[y as usize * stride + x as usize];
            let mut sum = [0.0f32; 3];
            let mut wsum = 0.0f32;
            for &(dx, dy, ws) in offsets {
                let p = buf[Border::Reflect101.index(y + dy, h) * stride
                    + Border::Reflect101.index(x + dx, w)];
                let diff = usize::from(p.r.abs_diff(c.r))
                    + usize::from(p.g.abs_diff(c.g))
                    + usize::from(p.b.abs_diff(c.b));
                let weight = ws * color_weights[diff];
                sum[0] += weight * f32::from(p.r);
                sum[1] += weight * f32::from(p.g);
                sum[2] += weight * f32::from(p.b);
                wsum += weight;
            }
            out.push(RGB8::new(
                saturate(sum[0] / wsum),
                saturate(sum[1] / wsum),
                saturate(sum[2] / wsum),
            ));
        }
    }
    ImgVec::new(out, w, h)
}
