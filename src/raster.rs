//! In-memory 8-bit rasters and image file I/O.
//!
//! [`Image`] is the pixel container shared by the filter bank, the metrics
//! and the classifier. Samples are always 8-bit; pixels are either a single
//! luminance channel or interleaved RGB. Every buffer is created through
//! `ImgVec::new`, so the stride always equals the width.
//!
//! # Example
//!
//! ```ignore
//! use dr_screen::Image;
//!
//! let fundus = Image::open("fundus.jpg")?;
//! let working = fundus.resize(512, 512);
//! working.save("working.png")?;
//! ```

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imgref::{ImgRef, ImgVec};
use rgb::RGB8;

use crate::error::{Error, Result, Shape};

/// An 8-bit grayscale or RGB image.
#[derive(Debug, Clone)]
pub enum Image {
    /// Single-channel luminance image.
    Gray(ImgVec<u8>),

    /// Interleaved RGB image.
    Rgb(ImgVec<RGB8>),
}

impl Image {
    /// Wrap a row-major luminance buffer.
    pub fn from_gray(data: Vec<u8>, width: usize, height: usize) -> Result<Self> {
        check_buffer(data.len(), width, height, 1)?;
        Ok(Self::Gray(ImgVec::new(data, width, height)))
    }

    /// Wrap a row-major RGB8 buffer (3 bytes per pixel).
    pub fn from_rgb(data: &[u8], width: usize, height: usize) -> Result<Self> {
        check_buffer(data.len(), width, height, 3)?;
        let pixels = data
            .chunks_exact(3)
            .map(|p| RGB8::new(p[0], p[1], p[2]))
            .collect();
        Ok(Self::Rgb(ImgVec::new(pixels, width, height)))
    }

    /// Decode an image file (JPEG or PNG).
    ///
    /// Images with color are decoded to RGB, grayscale files stay
    /// single-channel. A missing file, an undecodable file, or a zero-sized
    /// result is reported as [`Error::InvalidImage`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|e| Error::invalid_image(path, e.to_string()))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(Error::invalid_image(path, "decoded image has no pixels"));
        }
        Ok(Self::from_dynamic(decoded))
    }

    /// Decode an image file and project it to luminance.
    pub fn open_gray(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path).map(Self::into_luma)
    }

    fn from_dynamic(decoded: DynamicImage) -> Self {
        if decoded.color().has_color() {
            Self::from(decoded.to_rgb8())
        } else {
            Self::from(decoded.to_luma8())
        }
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Gray(img) => img.width(),
            Self::Rgb(img) => img.width(),
        }
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            Self::Gray(img) => img.height(),
            Self::Rgb(img) => img.height(),
        }
    }

    /// Number of samples per pixel (1 or 3).
    #[must_use]
    pub fn channels(&self) -> usize {
        match self {
            Self::Gray(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    /// `(width, height, channels)`.
    #[must_use]
    pub fn shape(&self) -> Shape {
        (self.width(), self.height(), self.channels())
    }

    /// Whether this is a single-channel image.
    #[must_use]
    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray(_))
    }

    /// Luminance plane.
    ///
    /// RGB is weighted 0.299/0.587/0.114 in 14-bit fixed point with
    /// round-half-up, which is what common 8-bit vision libraries produce.
    #[must_use]
    pub fn luma(&self) -> ImgVec<u8> {
        match self {
            Self::Gray(img) => img.clone(),
            Self::Rgb(img) => {
                let pixels = img.pixels().map(luma_of).collect();
                ImgVec::new(pixels, img.width(), img.height())
            }
        }
    }

    /// Luminance projection as an [`Image::Gray`].
    #[must_use]
    pub fn to_luma(&self) -> Self {
        Self::Gray(self.luma())
    }

    /// Consuming variant of [`Image::to_luma`]; grayscale images pass through.
    #[must_use]
    pub fn into_luma(self) -> Self {
        match self {
            Self::Gray(_) => self,
            Self::Rgb(_) => self.to_luma(),
        }
    }

    /// Split into one plane per channel.
    #[must_use]
    pub fn planes(&self) -> Vec<ImgVec<u8>> {
        match self {
            Self::Gray(img) => vec![img.clone()],
            Self::Rgb(img) => {
                let (w, h) = (img.width(), img.height());
                let r = img.pixels().map(|p| p.r).collect();
                let g = img.pixels().map(|p| p.g).collect();
                let b = img.pixels().map(|p| p.b).collect();
                vec![
                    ImgVec::new(r, w, h),
                    ImgVec::new(g, w, h),
                    ImgVec::new(b, w, h),
                ]
            }
        }
    }

    /// Reassemble an image from one (gray) or three (RGB) planes of equal size.
    pub fn from_planes(planes: Vec<ImgVec<u8>>) -> Result<Self> {
        match planes.as_slice() {
            [gray] => Ok(Self::Gray(gray.clone())),
            [r, g, b] => {
                let (w, h) = (r.width(), r.height());
                if (g.width(), g.height()) != (w, h) || (b.width(), b.height()) != (w, h) {
                    return Err(Error::ShapeMismatch {
                        expected: (w, h, 1),
                        actual: (g.width().max(b.width()), g.height().max(b.height()), 1),
                    });
                }
                let pixels = r
                    .pixels()
                    .zip(g.pixels())
                    .zip(b.pixels())
                    .map(|((r, g), b)| RGB8::new(r, g, b))
                    .collect();
                Ok(Self::Rgb(ImgVec::new(pixels, w, h)))
            }
            other => Err(Error::invalid_image(
                "",
                format!("expected 1 or 3 planes, got {}", other.len()),
            )),
        }
    }

    /// Apply a single-channel transform to every channel independently.
    #[must_use]
    pub fn map_planes<F>(&self, f: F) -> Self
    where
        F: Fn(ImgRef<'_, u8>) -> ImgVec<u8>,
    {
        match self {
            Self::Gray(img) => Self::Gray(f(img.as_ref())),
            Self::Rgb(_) => {
                let planes: Vec<ImgVec<u8>> = self.planes().iter().map(|p| f(p.as_ref())).collect();
                let (w, h) = (planes[0].width(), planes[0].height());
                let pixels = planes[0]
                    .pixels()
                    .zip(planes[1].pixels())
                    .zip(planes[2].pixels())
                    .map(|((r, g), b)| RGB8::new(r, g, b))
                    .collect();
                Self::Rgb(ImgVec::new(pixels, w, h))
            }
        }
    }

    /// Interleaved samples in row-major order.
    #[must_use]
    pub fn samples(&self) -> Vec<u8> {
        match self {
            Self::Gray(img) => img.pixels().collect(),
            Self::Rgb(img) => img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect(),
        }
    }

    /// Bilinear resize to the given dimensions, each at least 1.
    ///
    /// Uses `image`'s triangle filter, which widens its support when
    /// downscaling and so averages over the source area. OpenCV's
    /// `INTER_LINEAR` samples only the 2×2 nearest pixels, so strong
    /// downscales come out smoother here than under `cv2.resize`.
    #[must_use]
    pub fn resize(&self, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        if (self.width(), self.height()) == (width as usize, height as usize) {
            return self.clone();
        }
        match self {
            Self::Gray(_) => {
                let resized = image::imageops::resize(&self.to_gray_image(), width, height, FilterType::Triangle);
                Self::from(resized)
            }
            Self::Rgb(_) => {
                let resized = image::imageops::resize(&self.to_rgb_image(), width, height, FilterType::Triangle);
                Self::from(resized)
            }
        }
    }

    /// Encode to disk; the format follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        match self {
            Self::Gray(_) => self.to_gray_image().save(path)?,
            Self::Rgb(_) => self.to_rgb_image().save(path)?,
        }
        Ok(())
    }

    fn to_gray_image(&self) -> GrayImage {
        let luma = self.luma();
        let w = luma.width();
        let buf = luma.buf();
        GrayImage::from_fn(luma.width() as u32, luma.height() as u32, |x, y| {
            Luma([buf[y as usize * w + x as usize]])
        })
    }

    fn to_rgb_image(&self) -> RgbImage {
        match self {
            Self::Rgb(img) => {
                let w = img.width();
                let buf = img.buf();
                RgbImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
                    let p = buf[y as usize * w + x as usize];
                    Rgb([p.r, p.g, p.b])
                })
            }
            Self::Gray(img) => {
                let w = img.width();
                let buf = img.buf();
                RgbImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
                    let v = buf[y as usize * w + x as usize];
                    Rgb([v, v, v])
                })
            }
        }
    }
}

impl From<GrayImage> for Image {
    fn from(img: GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        Self::Gray(ImgVec::new(img.into_raw(), w, h))
    }
}

impl From<RgbImage> for Image {
    fn from(img: RgbImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let pixels = img.pixels().map(|p| RGB8::new(p[0], p[1], p[2])).collect();
        Self::Rgb(ImgVec::new(pixels, w, h))
    }
}

#[inline]
fn luma_of(p: RGB8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((u32::from(p.r) * R + u32::from(p.g) * G + u32::from(p.b) * B + (1 << 13)) >> 14) as u8
}

fn check_buffer(len: usize, width: usize, height: usize, channels: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::invalid_image("", format!("empty image {width}x{height}")));
    }
    if len != width * height * channels {
        return Err(Error::invalid_image(
            "",
            format!(
                "buffer holds {len} bytes, {width}x{height}x{channels} needs {}",
                width * height * channels
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgb(width: usize, height: usize) -> Image {
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 256) as u8).collect();
        Image::from_rgb(&data, width, height).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let img = gradient_rgb(40, 20);
        assert_eq!(img.width(), 40);
        assert_eq!(img.height(), 20);
        assert_eq!(img.shape(), (40, 20, 3));
        assert!(!img.is_gray());
    }

    #[test]
    fn test_rejects_empty_and_short_buffers() {
        assert!(matches!(
            Image::from_gray(Vec::new(), 0, 0),
            Err(Error::InvalidImage { .. })
        ));
        assert!(matches!(
            Image::from_rgb(&[1, 2, 3], 2, 1),
            Err(Error::InvalidImage { .. })
        ));
    }

    #[test]
    fn test_luma_weights() {
        let img = Image::from_rgb(&[255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255], 4, 1).unwrap();
        let luma: Vec<u8> = img.luma().pixels().collect();
        assert_eq!(luma, vec![76, 150, 29, 255]);
    }

    #[test]
    fn test_planes_roundtrip() {
        let img = gradient_rgb(8, 6);
        let back = Image::from_planes(img.planes()).unwrap();
        assert_eq!(back.samples(), img.samples());
    }

    #[test]
    fn test_map_planes_keeps_shape() {
        let img = gradient_rgb(9, 7);
        let inverted = img.map_planes(|p| {
            let px = p.pixels().map(|v| 255 - v).collect();
            ImgVec::new(px, p.width(), p.height())
        });
        assert_eq!(inverted.shape(), img.shape());
        assert_eq!(inverted.samples()[0], 255);
    }

    #[test]
    fn test_resize() {
        let img = gradient_rgb(64, 32);
        let small = img.resize(16, 8);
        assert_eq!(small.shape(), (16, 8, 3));
        let gray = img.to_luma().resize(10, 10);
        assert_eq!(gray.shape(), (10, 10, 1));
        assert_eq!(img.resize(0, 5).shape(), (1, 5, 3));
    }

    #[test]
    fn test_save_and_open_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.png");
        let img = gradient_rgb(12, 10);
        img.save(&path).unwrap();

        let loaded = Image::open(&path).unwrap();
        assert_eq!(loaded.samples(), img.samples());

        let gray = Image::open_gray(&path).unwrap();
        assert_eq!(gray.shape(), (12, 10, 1));
    }

    #[test]
    fn test_open_missing_file() {
        let result = Image::open("/definitely/not/here.jpg");
        assert!(matches!(result, Err(Error::InvalidImage { .. })));
    }

    #[test]
    fn test_open_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(Image::open(&path), Err(Error::InvalidImage { .. })));
    }
}
