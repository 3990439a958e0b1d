//! Border handling and the bridge between `imgref` planes and `imageproc`.
//!
//! `imageproc` filters extend the image by repeating edge pixels. To get
//! other border modes, planes are padded here first, filtered, and the
//! padding is cropped off again, so every output pixel sees the same
//! neighbourhood it would under the requested border.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::{filter3x3, median_filter, separable_filter};
use imgref::{ImgRef, ImgVec};

/// Single-channel float buffer in `image` layout.
pub(crate) type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// How out-of-range coordinates are folded back into the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Border {
    /// `gfedcb|abcdefgh|gfedcba`, edge pixel not repeated.
    Reflect101,
    /// `fedcba|abcdefgh|hgfedcb`, edge pixel repeated.
    Symmetric,
    /// `aaaaaa|abcdefgh|hhhhhhh`.
    Replicate,
}

impl Border {
    /// Map a possibly out-of-range coordinate onto `0..n`.
    #[inline]
    pub(crate) fn index(self, i: isize, n: usize) -> usize {
        let n = n as isize;
        if (0..n).contains(&i) {
            return i as usize;
        }
        let folded = match self {
            Self::Replicate => i.clamp(0, n - 1),
            Self::Reflect101 => {
                if n == 1 {
                    0
                } else {
                    let period = 2 * (n - 1);
                    let j = i.rem_euclid(period);
                    if j >= n { period - j } else { j }
                }
            }
            Self::Symmetric => {
                let period = 2 * n;
                let j = i.rem_euclid(period);
                if j >= n { period - 1 - j } else { j }
            }
        };
        folded as usize
    }
}

/// Copy `plane` into a float buffer grown by `(rx, ry)` on each side.
pub(crate) fn padded(plane: ImgRef<'_, u8>, rx: usize, ry: usize, border: Border) -> GrayF32 {
    let (w, h, stride) = (plane.width(), plane.height(), plane.stride());
    let buf: &[u8] = plane.buf();
    GrayF32::from_fn((w + 2 * rx) as u32, (h + 2 * ry) as u32, |x, y| {
        let sx = border.index(x as isize - rx as isize, w);
        let sy = border.index(y as isize - ry as isize, h);
        Luma([f32::from(buf[sy * stride + sx])])
    })
}

/// The `width × height` window of `buffer` starting at `(rx, ry)`.
pub(crate) fn cropped(buffer: &GrayF32, rx: usize, ry: usize, width: usize, height: usize) -> ImgVec<f32> {
    let stride = buffer.width() as usize;
    let raw = buffer.as_raw();
    let mut out = Vec::with_capacity(width * height);
    for y in ry..ry + height {
        let start = y * stride + rx;
        out.extend_from_slice(&raw[start..start + width]);
    }
    ImgVec::new(out, width, height)
}

/// Correlate with a row-major 3×3 kernel (no flip), producing raw floats.
pub(crate) fn correlate_3x3(plane: ImgRef<'_, u8>, taps: &[f32; 9], border: Border) -> ImgVec<f32> {
    let source = padded(plane, 1, 1, border);
    let response = filter3x3::<Luma<f32>, f32, f32>(&source, taps);
    cropped(&response, 1, 1, plane.width(), plane.height())
}

/// Correlate with the outer product `ky ⊗ kx`. Both kernels have odd length.
pub(crate) fn correlate_separable(
    plane: ImgRef<'_, u8>,
    kx: &[f32],
    ky: &[f32],
    border: Border,
) -> ImgVec<f32> {
    let (rx, ry) = (kx.len() / 2, ky.len() / 2);
    let source = padded(plane, rx, ry, border);
    let response = separable_filter::<Luma<f32>, f32>(&source, kx, ky);
    cropped(&response, rx, ry, plane.width(), plane.height())
}

/// Square median of side `2 * radius + 1`, edges replicated.
pub(crate) fn median(plane: ImgRef<'_, u8>, radius: u32) -> ImgVec<u8> {
    let (w, h) = (plane.width(), plane.height());
    let out = median_filter(&gray_image(plane), radius, radius);
    ImgVec::new(out.into_raw(), w, h)
}

fn gray_image(plane: ImgRef<'_, u8>) -> GrayImage {
    let (stride, buf) = (plane.stride(), plane.buf());
    GrayImage::from_fn(plane.width() as u32, plane.height() as u32, |x, y| {
        Luma([buf[y as usize * stride + x as usize]])
    })
}

/// Round half to even and clamp to the 8-bit range.
#[inline]
pub(crate) fn saturate(v: f32) -> u8 {
    v.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Absolute value, rounded and clamped to the 8-bit range.
#[inline]
pub(crate) fn saturate_abs(v: f32) -> u8 {
    saturate(v.abs())
}

/// Map a float plane to 8 bits with `convert`.
pub(crate) fn to_u8(plane: &ImgVec<f32>, convert: impl Fn(f32) -> u8) -> ImgVec<u8> {
    let pixels = plane.pixels().map(convert).collect();
    ImgVec::new(pixels, plane.width(), plane.height())
}
