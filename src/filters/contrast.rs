//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is divided into a grid of tiles. Each tile gets its own
//! equalization lookup table, built from a histogram whose bins are clipped
//! at a limit so flat regions do not have their noise stretched. Output
//! pixels blend the LUTs of the four nearest tile centres bilinearly, which
//! removes tile seams.
//!
//! Color images are equalized on the L\* channel of L\*a\*b\* only.

use imgref::{ImgRef, ImgVec};
use serde::{Deserialize, Serialize};

use super::kernel::{Border, saturate};
use crate::colorspace::{merge_lab, split_lab};
use crate::raster::Image;

const BINS: usize = 256;

/// Parameters for [`clahe_with`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClaheParams {
    /// Histogram clip limit, relative to a uniform histogram.
    pub clip_limit: f32,
    /// Tile grid as (columns, rows).
    pub grid: (usize, usize),
}

impl Default for ClaheParams {
    /// Clip limit 3.0 on an 8×8 grid.
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            grid: (8, 8),
        }
    }
}

impl ClaheParams {
    /// Gentler clip limit (2.0) used inside the median-based hybrid variants.
    #[must_use]
    pub fn mild() -> Self {
        Self {
            clip_limit: 2.0,
            ..Self::default()
        }
    }
}

/// CLAHE with the default parameters.
#[must_use]
pub fn clahe(image: &Image) -> Image {
    clahe_with(image, ClaheParams::default())
}

/// CLAHE on luminance (grayscale input) or on L\* (RGB input).
#[must_use]
pub fn clahe_with(image: &Image, params: ClaheParams) -> Image {
    match image {
        Image::Gray(img) => Image::Gray(clahe_plane(img.as_ref(), params)),
        Image::Rgb(img) => {
            let [l, a, b] = split_lab(img.as_ref());
            let l = clahe_plane(l.as_ref(), params);
            Image::Rgb(merge_lab(&[l, a, b]))
        }
    }
}

/// Equalize one 8-bit plane.
pub(crate) fn clahe_plane(src: ImgRef<'_, u8>, params: ClaheParams) -> ImgVec<u8> {
    let (w, h, stride) = (src.width(), src.height(), src.stride());
    let buf: &[u8] = src.buf();
    let (tiles_x, tiles_y) = (params.grid.0.max(1), params.grid.1.max(1));

    // Pad (mirrored) up to a whole number of tiles for LUT construction.
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);
    let tile_area = tile_w * tile_h;

    let clip = if params.clip_limit > 0.0 {
        ((params.clip_limit * tile_area as f32 / BINS as f32) as usize).max(1)
    } else {
        usize::MAX
    };
    let lut_scale = (BINS - 1) as f32 / tile_area as f32;

    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0usize; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let row = Border::Reflect101.index(y as isize, h) * stride;
                for x in tx * tile_w..(tx + 1) * tile_w {
                    hist[usize::from(buf[row + Border::Reflect101.index(x as isize, w)])] += 1;
                }
            }
            clip_histogram(&mut hist, clip);

            let lut = &mut luts[ty * tiles_x + tx];
            let mut cdf = 0usize;
            for (entry, &count) in lut.iter_mut().zip(hist.iter()) {
                cdf += count;
                *entry = saturate(cdf as f32 * lut_scale);
            }
        }
    }

    // Bilinear blend of the four surrounding tile LUTs.
    let column_weights: Vec<(usize, usize, f32)> = (0..w)
        .map(|x| interpolation_weights(x, tile_w, tiles_x))
        .collect();

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let (ty1, ty2, ya) = interpolation_weights(y, tile_h, tiles_y);
        for (x, &(tx1, tx2, xa)) in column_weights.iter().enumerate() {
            let v = usize::from(buf[y * stride + x]);
            let top = f32::from(luts[ty1 * tiles_x + tx1][v]) * (1.0 - xa)
                + f32::from(luts[ty1 * tiles_x + tx2][v]) * xa;
            let bottom = f32::from(luts[ty2 * tiles_x + tx1][v]) * (1.0 - xa)
                + f32::from(luts[ty2 * tiles_x + tx2][v]) * xa;
            out.push(saturate(top * (1.0 - ya) + bottom * ya));
        }
    }
    ImgVec::new(out, w, h)
}

/// Clip bins at `limit` and spread the excess: evenly first, then the
/// remainder one count at a time at a fixed stride.
fn clip_histogram(hist: &mut [usize; BINS], limit: usize) {
    let mut clipped = 0usize;
    for bin in hist.iter_mut() {
        if *bin > limit {
            clipped += *bin - limit;
            *bin = limit;
        }
    }
    if clipped == 0 {
        return;
    }

    let batch = clipped / BINS;
    let mut residual = clipped - batch * BINS;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }
}

/// Neighbouring tile indices and the weight of the second one for a pixel
/// coordinate, measured from tile centres.
fn interpolation_weights(pos: usize, tile: usize, tiles: usize) -> (usize, usize, f32) {
    let f = pos as f32 / tile as f32 - 0.5;
    let lower = f.floor();
    let weight = f - lower;
    let lower = lower as isize;
    let first = lower.max(0) as usize;
    let second = ((lower + 1) as usize).min(tiles - 1);
    (first, second, weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_contrast_gradient(w: usize, h: usize) -> Image {
        let data: Vec<u8> = (0..w * h).map(|i| 100 + ((i % w) * 20 / w) as u8).collect();
        Image::from_gray(data, w, h).unwrap()
    }

    fn spread(samples: &[u8]) -> u8 {
        samples.iter().max().unwrap() - samples.iter().min().unwrap()
    }

    #[test]
    fn test_stretches_low_contrast() {
        let img = low_contrast_gradient(64, 64);
        let params = ClaheParams {
            clip_limit: 40.0,
            grid: (2, 2),
        };
        let out = clahe_with(&img, params);
        assert_eq!(out.shape(), img.shape());
        assert!(spread(&out.samples()) > 4 * spread(&img.samples()));
    }

    #[test]
    fn test_clip_limits_amplification() {
        let img = low_contrast_gradient(64, 64);
        let strong = clahe_with(
            &img,
            ClaheParams {
                clip_limit: 40.0,
                grid: (2, 2),
            },
        );
        let mild = clahe_with(
            &img,
            ClaheParams {
                grid: (2, 2),
                ..ClaheParams::mild()
            },
        );
        assert!(spread(&mild.samples()) < spread(&strong.samples()));
    }

    #[test]
    fn test_default_keeps_shape() {
        let img = low_contrast_gradient(64, 64);
        assert_eq!(clahe(&img).shape(), (64, 64, 1));
    }

    #[test]
    fn test_non_divisible_size() {
        let img = low_contrast_gradient(37, 29);
        assert_eq!(clahe(&img).shape(), (37, 29, 1));
    }

    #[test]
    fn test_color_keeps_channels() {
        let data: Vec<u8> = (0..30 * 20 * 3).map(|i| (90 + (i % 40)) as u8).collect();
        let img = Image::from_rgb(&data, 30, 20).unwrap();
        let out = clahe(&img);
        assert_eq!(out.shape(), (30, 20, 3));
    }

    #[test]
    fn test_clip_histogram_conserves_mass() {
        let mut hist = [0usize; BINS];
        hist[10] = 1000;
        hist[11] = 5;
        clip_histogram(&mut hist, 40);
        assert_eq!(hist.iter().sum::<usize>(), 1005);
        assert!(hist[10] <= 40 + 1000 / BINS + 1);
    }

    #[test]
    fn test_interpolation_weights_edges() {
        // First half-tile clamps to tile 0.
        let (a, b, _) = interpolation_weights(0, 8, 4);
        assert_eq!((a, b), (0, 0));
        // Last pixel clamps to the last tile.
        let (a, b, _) = interpolation_weights(31, 8, 4);
        assert_eq!((a, b), (3, 3));
        // Between centres of tiles 0 and 1.
        let (a, b, wgt) = interpolation_weights(8, 8, 4);
        assert_eq!((a, b), (0, 1));
        assert!((wgt - 0.5).abs() < 1e-6);
    }
}
