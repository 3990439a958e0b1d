//! sRGB ⇄ CIE L\*a\*b\* conversion on 8-bit samples.
//!
//! Contrast enhancement works on the lightness channel of a perceptually
//! uniform space so that hue is left alone. The 8-bit encoding follows the
//! usual vision-library convention:
//!
//! | Channel | Stored as |
//! |---------|-----------|
//! | L\* (0-100) | `L * 255 / 100` |
//! | a\* | `a + 128` |
//! | b\* | `b + 128` |
//!
//! White point is D65.

use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

// sRGB primaries to XYZ (D65)
const RGB_TO_XYZ: [f32; 9] = [
    0.412_453, 0.357_580, 0.180_423, // X
    0.212_671, 0.715_160, 0.072_169, // Y
    0.019_334, 0.119_193, 0.950_227, // Z
];

const XYZ_TO_RGB: [f32; 9] = [
    3.240_479, -1.537_15, -0.498_535,
    -0.969_256, 1.875_991, 0.041_556,
    0.055_648, -0.204_043, 1.057_311,
];

const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;

// CIE constants
const EPSILON: f32 = 0.008_856;
const KAPPA: f32 = 903.3;

/// sRGB gamma decoding (sRGB to linear RGB).
#[inline]
fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB gamma encoding (linear RGB to sRGB).
#[inline]
fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert one sRGB pixel to 8-bit encoded `[L, a, b]`.
#[must_use]
pub fn rgb_to_lab(p: RGB8) -> [u8; 3] {
    let r = srgb_to_linear(f32::from(p.r) / 255.0);
    let g = srgb_to_linear(f32::from(p.g) / 255.0);
    let b = srgb_to_linear(f32::from(p.b) / 255.0);

    let m = &RGB_TO_XYZ;
    let x = (m[0] * r + m[1] * g + m[2] * b) / WHITE_X;
    let y = m[3] * r + m[4] * g + m[5] * b;
    let z = (m[6] * r + m[7] * g + m[8] * b) / WHITE_Z;

    let fy = lab_f(y);
    let l = if y > EPSILON { 116.0 * fy - 16.0 } else { KAPPA * y };
    let a = 500.0 * (lab_f(x) - fy);
    let b_star = 200.0 * (fy - lab_f(z));

    [
        quantize(l * 255.0 / 100.0),
        quantize(a + 128.0),
        quantize(b_star + 128.0),
    ]
}

/// Convert 8-bit encoded `[L, a, b]` back to sRGB.
#[must_use]
pub fn lab_to_rgb(lab: [u8; 3]) -> RGB8 {
    let l = f32::from(lab[0]) * 100.0 / 255.0;
    let a = f32::from(lab[1]) - 128.0;
    let b_star = f32::from(lab[2]) - 128.0;

    let (y, fy) = if l <= KAPPA * EPSILON {
        let y = l / KAPPA;
        (y, 7.787 * y + 16.0 / 116.0)
    } else {
        let fy = (l + 16.0) / 116.0;
        (fy * fy * fy, fy)
    };

    let inverse_f = |f: f32| {
        let cube = f * f * f;
        if cube > EPSILON {
            cube
        } else {
            (f - 16.0 / 116.0) / 7.787
        }
    };
    let x = inverse_f(fy + a / 500.0) * WHITE_X;
    let z = inverse_f(fy - b_star / 200.0) * WHITE_Z;

    let m = &XYZ_TO_RGB;
    let r = m[0] * x + m[1] * y + m[2] * z;
    let g = m[3] * x + m[4] * y + m[5] * z;
    let b = m[6] * x + m[7] * y + m[8] * z;

    RGB8::new(
        quantize(linear_to_srgb(r.clamp(0.0, 1.0)) * 255.0),
        quantize(linear_to_srgb(g.clamp(0.0, 1.0)) * 255.0),
        quantize(linear_to_srgb(b.clamp(0.0, 1.0)) * 255.0),
    )
}

/// Split an RGB image into `[L, a, b]` planes.
#[must_use]
pub fn split_lab(img: ImgRef<'_, RGB8>) -> [ImgVec<u8>; 3] {
    let (w, h) = (img.width(), img.height());
    let mut l = Vec::with_capacity(w * h);
    let mut a = Vec::with_capacity(w * h);
    let mut b = Vec::with_capacity(w * h);
    for p in img.pixels() {
        let [pl, pa, pb] = rgb_to_lab(p);
        l.push(pl);
        a.push(pa);
        b.push(pb);
    }
    [
        ImgVec::new(l, w, h),
        ImgVec::new(a, w, h),
        ImgVec::new(b, w, h),
    ]
}

/// Merge `[L, a, b]` planes of identical size back into RGB.
#[must_use]
pub fn merge_lab(planes: &[ImgVec<u8>; 3]) -> ImgVec<RGB8> {
    let [l, a, b] = planes;
    let pixels = l
        .pixels()
        .zip(a.pixels())
        .zip(b.pixels())
        .map(|((l, a), b)| lab_to_rgb([l, a, b]))
        .collect();
    ImgVec::new(pixels, l.width(), l.height())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_axis() {
        assert_eq!(rgb_to_lab(RGB8::new(0, 0, 0)), [0, 128, 128]);
        assert_eq!(rgb_to_lab(RGB8::new(255, 255, 255)), [255, 128, 128]);

        let [l, a, b] = rgb_to_lab(RGB8::new(128, 128, 128));
        assert!((i32::from(l) - 137).abs() <= 1, "mid gray L was {l}");
        assert_eq!((a, b), (128, 128));
    }

    #[test]
    fn test_primary_signs() {
        let [_, a, _] = rgb_to_lab(RGB8::new(255, 0, 0));
        assert!(a > 128, "red should have positive a*");
        let [_, _, b] = rgb_to_lab(RGB8::new(0, 0, 255));
        assert!(b < 128, "blue should have negative b*");
    }

    #[test]
    fn test_roundtrip_is_close() {
        let mut max_diff = 0i32;
        for r in (0..=255u8).step_by(17) {
            for g in (0..=255u8).step_by(17) {
                for b in (0..=255u8).step_by(17) {
                    let back = lab_to_rgb(rgb_to_lab(RGB8::new(r, g, b)));
                    max_diff = max_diff
                        .max((i32::from(back.r) - i32::from(r)).abs())
                        .max((i32::from(back.g) - i32::from(g)).abs())
                        .max((i32::from(back.b) - i32::from(b)).abs());
                }
            }
        }
        // 8-bit a*/b* quantization costs a few levels on saturated colors
        assert!(max_diff <= 12, "max roundtrip diff {max_diff}");
    }

    #[test]
    fn test_split_merge_shape() {
        let pixels: Vec<RGB8> = (0..6 * 4).map(|i| RGB8::new(i as u8 * 10, 90, 200)).collect();
        let img = ImgVec::new(pixels, 6, 4);
        let planes = split_lab(img.as_ref());
        let merged = merge_lab(&planes);
        assert_eq!((merged.width(), merged.height()), (6, 4));
    }
}
