//! Edge detectors on the luminance projection.
//!
//! Each detector returns a grayscale magnitude map of the input size.

use imgref::{ImgRef, ImgVec};

use super::kernel::{Border, correlate_3x3, correlate_separable, saturate, saturate_abs, to_u8};
use crate::raster::Image;

/// First-derivative Sobel taps.
const SOBEL_DERIV: [f32; 3] = [-1.0, 0.0, 1.0];

const PREWITT_X: [f32; 9] = [1.0, 0.0, -1.0, 1.0, 0.0, -1.0, 1.0, 0.0, -1.0];
const PREWITT_Y: [f32; 9] = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, -1.0, -1.0, -1.0];

const LAPLACIAN_4: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Mixed-derivative Sobel response `|∂²I/∂x∂y|` on luminance.
///
/// This responds to corners and oblique structure (vessel crossings,
/// lesion rims) rather than to straight horizontal or vertical edges.
#[must_use]
pub fn sobel(image: &Image) -> Image {
    Image::Gray(sobel_plane(image.luma().as_ref()))
}

pub(crate) fn sobel_plane(plane: ImgRef<'_, u8>) -> ImgVec<u8> {
    let response = correlate_separable(plane, &SOBEL_DERIV, &SOBEL_DERIV, Border::Reflect101);
    to_u8(&response, saturate_abs)
}

/// Prewitt edges: horizontal and vertical responses, each clipped at zero,
/// summed with saturation.
#[must_use]
pub fn prewitt(image: &Image) -> Image {
    let luma = image.luma();
    let gx = to_u8(&correlate_3x3(luma.as_ref(), &PREWITT_X, Border::Reflect101), saturate);
    let gy = to_u8(&correlate_3x3(luma.as_ref(), &PREWITT_Y, Border::Reflect101), saturate);
    let pixels = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(x, y)| x.saturating_add(y))
        .collect();
    Image::Gray(ImgVec::new(pixels, luma.width(), luma.height()))
}

/// 4-neighbour Laplacian magnitude.
#[must_use]
pub fn laplacian(image: &Image) -> Image {
    let luma = image.luma();
    let response = correlate_3x3(luma.as_ref(), &LAPLACIAN_4, Border::Reflect101);
    Image::Gray(to_u8(&response, saturate_abs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: u8) -> Image {
        Image::from_gray(vec![value; 12 * 12], 12, 12).unwrap()
    }

    fn vertical_step() -> Image {
        let data: Vec<u8> = (0..12 * 12).map(|i| if i % 12 < 6 { 20 } else { 200 }).collect();
        Image::from_gray(data, 12, 12).unwrap()
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let img = flat(90);
        for out in [sobel(&img), prewitt(&img), laplacian(&img)] {
            assert!(out.samples().iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_color_reduced_to_gray() {
        let data: Vec<u8> = (0..10 * 8 * 3).map(|i| (i * 11 % 256) as u8).collect();
        let img = Image::from_rgb(&data, 10, 8).unwrap();
        for out in [sobel(&img), prewitt(&img), laplacian(&img)] {
            assert_eq!(out.shape(), (10, 8, 1));
        }
    }

    #[test]
    fn test_laplacian_marks_step() {
        let out = laplacian(&vertical_step()).samples();
        // Row 5: columns 5 and 6 straddle the step.
        assert_eq!(out[5 * 12 + 5], 180);
        assert_eq!(out[5 * 12 + 6], 180);
        assert_eq!(out[5 * 12 + 2], 0);
    }

    #[test]
    fn test_prewitt_keeps_only_positive_responses() {
        // Bright-to-dark going right gives a positive x response with these taps.
        let data: Vec<u8> = (0..12 * 12).map(|i| if i % 12 < 6 { 200 } else { 20 }).collect();
        let img = Image::from_gray(data, 12, 12).unwrap();
        let out = prewitt(&img).samples();
        assert_eq!(out[5 * 12 + 5], 255);

        // The mirrored step yields a negative response, clipped to zero.
        let mirrored = prewitt(&vertical_step()).samples();
        assert_eq!(mirrored[5 * 12 + 5], 0);
    }

    #[test]
    fn test_mixed_sobel_ignores_straight_step() {
        let out = sobel(&vertical_step()).samples();
        assert!(out[5 * 12 + 5..5 * 12 + 7].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_mixed_sobel_fires_on_corner() {
        // Bright quadrant in the bottom-right corner.
        let data: Vec<u8> = (0..12 * 12)
            .map(|i| if i % 12 >= 6 && i / 12 >= 6 { 200 } else { 0 })
            .collect();
        let img = Image::from_gray(data, 12, 12).unwrap();
        let out = sobel(&img).samples();
        assert_eq!(out[5 * 12 + 5], 200);
    }
}
