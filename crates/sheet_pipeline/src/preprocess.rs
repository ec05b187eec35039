//! Image preprocessing module
//!
//! Straight-line transforms shared by the cropper, analyzer and verifier:
//! - EXIF auto-rotation
//! - Fractional to pixel crop boxes
//! - Width-capped Lanczos downscale
//! - Contrast and sharpness enhancement (mean-luminance and smoothed blends)
//! - Upscale and fixed-threshold binarization for OCR

use crate::error::{PipelineError, Result};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, Luma, RgbImage};
use imageproc::map::map_colors;
use imageproc::rect::Rect;
use std::path::Path;

/// Rotation applied to a page so its text reads upright
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRotation {
    None,
    /// EXIF orientation 6
    Clockwise90,
    /// EXIF orientation 3
    Half,
    /// EXIF orientation 8
    CounterClockwise90,
}

impl PageRotation {
    /// Only 3, 6 and 8 rotate; mirrored orientations are left alone.
    fn from_orientation(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Rotate90 => Self::Clockwise90,
            Orientation::Rotate180 => Self::Half,
            Orientation::Rotate270 => Self::CounterClockwise90,
            _ => Self::None,
        }
    }

    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::None => image,
            Self::Clockwise90 => image.rotate90(),
            Self::Half => image.rotate180(),
            Self::CounterClockwise90 => image.rotate270(),
        }
    }
}

/// Decode a page and rotate it upright
///
/// A missing or unreadable orientation tag leaves the page as stored.
pub fn load_oriented(path: &Path) -> Result<(DynamicImage, PageRotation)> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PipelineError::io(path, e))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| PipelineError::image(path, e))?;

    let rotation = match decoder.orientation() {
        Ok(orientation) => PageRotation::from_orientation(orientation),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no usable EXIF orientation");
            PageRotation::None
        }
    };

    let image = DynamicImage::from_decoder(decoder).map_err(|e| PipelineError::image(path, e))?;
    Ok((rotation.apply(image), rotation))
}

/// Pixel box for a `(left, top, right, bottom)` fractional window
///
/// Coordinates are truncated toward zero and clamped to the image. Returns
/// `None` when the box would be empty.
pub fn pixel_box(width: u32, height: u32, window: (f64, f64, f64, f64)) -> Option<Rect> {
    let (l, t, r, b) = window;
    let scale = |frac: f64, extent: u32| ((extent as f64 * frac).max(0.0) as u32).min(extent);

    let left = scale(l, width);
    let right = scale(r, width);
    let top = scale(t, height);
    let bottom = scale(b, height);

    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::at(left as i32, top as i32).of_size(right - left, bottom - top))
}

/// Crop a region described by a pixel box
pub fn crop(image: &DynamicImage, rect: Rect) -> DynamicImage {
    image.crop_imm(rect.left() as u32, rect.top() as u32, rect.width(), rect.height())
}

/// Downscale to `max_width`, keeping the aspect ratio; narrower images pass through
pub fn fit_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (w, h) = (image.width(), image.height());
    if w <= max_width {
        return image;
    }
    let ratio = max_width as f64 / w as f64;
    let new_height = ((h as f64 * ratio) as u32).max(1);
    image.resize_exact(max_width, new_height, FilterType::Lanczos3)
}

/// ITU-R 601-2 luma in 16-bit fixed point, rounded to the nearest level
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

/// Rounded mean of 8-bit levels
fn mean_level(levels: impl Iterator<Item = u8>) -> f32 {
    let (sum, count) = levels.fold((0u64, 0u64), |(s, n), v| (s + v as u64, n + 1));
    if count == 0 {
        return 0.0;
    }
    (sum as f64 / count as f64 + 0.5).floor() as f32
}

/// Linear blend, truncated toward zero and clipped to 8 bits
fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate)).clamp(0.0, 255.0) as u8
}

/// Grayscale with 601 weights, as 8-bit `L` conversion does
///
/// `DynamicImage::to_luma8` uses Rec. 709 weights instead.
pub fn grayscale(image: &DynamicImage) -> GrayImage {
    map_colors(&image.to_rgb8(), |p| Luma([luma(p[0], p[1], p[2])]))
}

/// Contrast enhancement around the mean luminance
///
/// A factor of 1.0 returns the input; 0.0 gives a flat gray image.
pub fn enhance_contrast_rgb(image: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_level(image.pixels().map(|p| luma(p[0], p[1], p[2])));

    map_colors(image, |p| {
        image::Rgb([
            blend(mean, p[0] as f32, factor),
            blend(mean, p[1] as f32, factor),
            blend(mean, p[2] as f32, factor),
        ])
    })
}

pub fn enhance_contrast_luma(image: &GrayImage, factor: f32) -> GrayImage {
    let mean = mean_level(image.pixels().map(|p| p[0]));
    map_colors(image, |p| Luma([blend(mean, p[0] as f32, factor)]))
}

/// Sharpness enhancement: extrapolate away from a 3x3 smoothed copy
///
/// Border pixels have no full neighbourhood and are kept as-is.
pub fn enhance_sharpness(image: &GrayImage, factor: f32) -> GrayImage {
    let (w, h) = image.dimensions();
    if w < 3 || h < 3 {
        return image.clone();
    }

    // 1 1 1 / 1 5 1 / 1 1 1, normalised by 13
    let mut out = image.clone();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5 } else { 1 };
                    acc += weight * image.get_pixel(x + dx - 1, y + dy - 1)[0] as u32;
                }
            }
            let smoothed = (acc as f32 / 13.0).round();
            let value = image.get_pixel(x, y)[0] as f32;
            out.put_pixel(x, y, Luma([blend(smoothed, value, factor)]));
        }
    }
    out
}

/// Integer upscale with Lanczos3
pub fn upscale(image: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    match (w.checked_mul(factor), h.checked_mul(factor)) {
        (Some(nw), Some(nh)) => image::imageops::resize(image, nw, nh, FilterType::Lanczos3),
        _ => {
            tracing::debug!(w, h, factor, "upscale would overflow, skipped");
            image.clone()
        }
    }
}

/// Luminance below `threshold` becomes black, everything else white
pub fn binarize(image: &GrayImage, threshold: u8) -> GrayImage {
    map_colors(image, |p| Luma([if p[0] < threshold { 0 } else { 255 }]))
}

/// Parameters for the heavy OCR preprocessing chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcrPreprocess {
    pub contrast: f32,
    pub sharpness: f32,
    pub upscale: u32,
    pub threshold: u8,
}

impl From<&crate::config::VerifyConfig> for OcrPreprocess {
    fn from(config: &crate::config::VerifyConfig) -> Self {
        Self {
            contrast: config.contrast,
            sharpness: config.sharpness,
            upscale: config.upscale,
            threshold: config.threshold,
        }
    }
}

/// grayscale -> contrast -> sharpness -> upscale -> binarize
pub fn prepare_for_ocr(image: &DynamicImage, params: OcrPreprocess) -> GrayImage {
    let gray = grayscale(image);
    let gray = enhance_contrast_luma(&gray, params.contrast);
    let gray = enhance_sharpness(&gray, params.sharpness);
    let gray = upscale(&gray, params.upscale);
    binarize(&gray, params.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_rotation_from_orientation() {
        assert_eq!(PageRotation::from_orientation(Orientation::NoTransforms), PageRotation::None);
        assert_eq!(PageRotation::from_orientation(Orientation::Rotate180), PageRotation::Half);
        assert_eq!(PageRotation::from_orientation(Orientation::Rotate90), PageRotation::Clockwise90);
        assert_eq!(
            PageRotation::from_orientation(Orientation::Rotate270),
            PageRotation::CounterClockwise90
        );
        // Mirrored orientations are ignored
        assert_eq!(PageRotation::from_orientation(Orientation::FlipHorizontal), PageRotation::None);
    }

    /// Little-endian TIFF block holding a single orientation (0x0112) SHORT
    fn orientation_tiff(value: u16) -> Vec<u8> {
        let mut tiff = b"II*\0".to_vec();
        tiff.extend_from_slice(&8u32.to_le_bytes());
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x0112u16.to_le_bytes());
        tiff.extend_from_slice(&3u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&value.to_le_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff
    }

    /// Write a 40x20 JPEG with an APP1 Exif segment right after SOI
    fn write_jpeg_with_exif(path: &Path, tiff: &[u8]) {
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut jpeg)
            .encode_image(&RgbImage::from_pixel(40, 20, Rgb([200, 30, 30])))
            .unwrap();

        let mut app1 = vec![0xFF, 0xE1];
        app1.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(tiff);

        let mut bytes = jpeg[..2].to_vec();
        bytes.extend_from_slice(&app1);
        bytes.extend_from_slice(&jpeg[2..]);
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_load_oriented_reads_exif_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            (6, PageRotation::Clockwise90, (20, 40)),
            (8, PageRotation::CounterClockwise90, (20, 40)),
            (3, PageRotation::Half, (40, 20)),
            (1, PageRotation::None, (40, 20)),
        ];
        for (tag, expected, dims) in cases {
            let path = dir.path().join(format!("page_{tag}.jpg"));
            write_jpeg_with_exif(&path, &orientation_tiff(tag));

            let (img, rotation) = load_oriented(&path).unwrap();
            assert_eq!(rotation, expected, "orientation {tag}");
            assert_eq!((img.width(), img.height()), dims, "orientation {tag}");
        }
    }

    #[test]
    fn test_load_oriented_malformed_exif_keeps_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.jpg");
        // IFD offset points far past the end of the block
        write_jpeg_with_exif(&path, b"II*\0\xff\xff\x00\x00");

        let (img, rotation) = load_oriented(&path).unwrap();
        assert_eq!(rotation, PageRotation::None);
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(30, 20));
        let rotated = PageRotation::Clockwise90.apply(img.clone());
        assert_eq!((rotated.width(), rotated.height()), (20, 30));
        let half = PageRotation::Half.apply(img);
        assert_eq!((half.width(), half.height()), (30, 20));
    }

    #[test]
    fn test_clockwise_moves_top_left_to_top_right() {
        let mut buf: RgbImage = ImageBuffer::new(4, 2);
        buf.put_pixel(0, 0, Rgb([255, 0, 0]));
        let rotated = PageRotation::Clockwise90
            .apply(DynamicImage::ImageRgb8(buf))
            .to_rgb8();
        assert_eq!(rotated.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_load_oriented_without_exif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        ImageBuffer::from_pixel(12, 8, Rgb([10u8, 20, 30]))
            .save(&path)
            .unwrap();

        let (img, rotation) = load_oriented(&path).unwrap();
        assert_eq!(rotation, PageRotation::None);
        assert_eq!((img.width(), img.height()), (12, 8));
    }

    #[test]
    fn test_load_oriented_missing_file() {
        let err = load_oriented(Path::new("/definitely/not/here.jpg")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn test_pixel_box_truncates() {
        let rect = pixel_box(1000, 2000, (0.03, 0.0, 0.97, 0.31)).unwrap();
        assert_eq!(rect.left(), 30);
        assert_eq!(rect.top(), 0);
        assert_eq!(rect.width(), 940);
        assert_eq!(rect.height(), 620);
    }

    #[test]
    fn test_pixel_box_empty() {
        assert!(pixel_box(10, 10, (0.0, 0.5, 1.0, 0.51)).is_none());
        assert!(pixel_box(0, 10, (0.0, 0.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn test_fit_width_caps_and_keeps_aspect() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(1600, 900));
        let fitted = fit_width(img, 800);
        assert_eq!((fitted.width(), fitted.height()), (800, 450));
    }

    #[test]
    fn test_fit_width_leaves_narrow_images() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(640, 900));
        let fitted = fit_width(img, 800);
        assert_eq!((fitted.width(), fitted.height()), (640, 900));
    }

    #[test]
    fn test_fit_width_never_zero_height() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::new(5000, 2));
        let fitted = fit_width(img, 800);
        assert_eq!(fitted.height(), 1);
    }

    #[test]
    fn test_contrast_identity_and_spread() {
        let mut img: RgbImage = ImageBuffer::from_pixel(2, 1, Rgb([100, 100, 100]));
        img.put_pixel(1, 0, Rgb([200, 200, 200]));

        assert_eq!(enhance_contrast_rgb(&img, 1.0), img);

        // mean 150: 100 -> 50, 200 -> 250 at factor 2
        let boosted = enhance_contrast_rgb(&img, 2.0);
        assert_eq!(boosted.get_pixel(0, 0), &Rgb([50, 50, 50]));
        assert_eq!(boosted.get_pixel(1, 0), &Rgb([250, 250, 250]));
    }

    #[test]
    fn test_contrast_truncates_blend() {
        // mean 100.5 rounds to 101; 101 + 1.5 * (100 - 101) = 99.5 -> 99
        let mut img: GrayImage = ImageBuffer::from_pixel(2, 1, Luma([100]));
        img.put_pixel(1, 0, Luma([101]));
        let boosted = enhance_contrast_luma(&img, 1.5);
        assert_eq!(boosted.get_pixel(0, 0)[0], 99);
        assert_eq!(boosted.get_pixel(1, 0)[0], 101);
    }

    #[test]
    fn test_contrast_rgb_mean_uses_rounded_levels() {
        // Pure red is level 76, pure blue level 29: mean 52.5 -> 53
        let mut img: RgbImage = ImageBuffer::from_pixel(2, 1, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));
        let flat = enhance_contrast_rgb(&img, 0.0);
        assert!(flat.pixels().all(|p| *p == Rgb([53, 53, 53])));
    }

    #[test]
    fn test_grayscale_601_weights() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(3, 1, |x, _| {
            [Rgb([255u8, 0, 0]), Rgb([0, 255, 0]), Rgb([0, 0, 255])][x as usize]
        }));
        let gray = grayscale(&img);
        assert_eq!(gray.as_raw(), &vec![76, 150, 29]);
    }

    #[test]
    fn test_upscale_overflow_leaves_image() {
        let img: GrayImage = ImageBuffer::from_pixel(4, 4, Luma([9]));
        assert_eq!(upscale(&img, u32::MAX), img);
    }

    #[test]
    fn test_contrast_luma_clamps() {
        let mut img: GrayImage = ImageBuffer::from_pixel(2, 1, Luma([0]));
        img.put_pixel(1, 0, Luma([255]));
        let boosted = enhance_contrast_luma(&img, 3.0);
        assert_eq!(boosted.get_pixel(0, 0)[0], 0);
        assert_eq!(boosted.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_sharpness_flat_image_unchanged() {
        let img: GrayImage = ImageBuffer::from_pixel(5, 5, Luma([120]));
        assert_eq!(enhance_sharpness(&img, 2.0), img);
    }

    #[test]
    fn test_sharpness_accentuates_dot() {
        let mut img: GrayImage = ImageBuffer::from_pixel(5, 5, Luma([100]));
        img.put_pixel(2, 2, Luma([200]));
        let sharp = enhance_sharpness(&img, 2.0);
        assert!(sharp.get_pixel(2, 2)[0] > 200);
        assert!(sharp.get_pixel(1, 2)[0] < 100);
        // border untouched
        assert_eq!(sharp.get_pixel(0, 0)[0], 100);
    }

    #[test]
    fn test_binarize_threshold_boundary() {
        let img: GrayImage = ImageBuffer::from_fn(3, 1, |x, _| Luma([[179u8, 180, 181][x as usize]]));
        let bin = binarize(&img, 180);
        assert_eq!(bin.get_pixel(0, 0)[0], 0);
        assert_eq!(bin.get_pixel(1, 0)[0], 255);
        assert_eq!(bin.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_prepare_for_ocr_doubles_and_binarizes() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_fn(10, 6, |x, _| {
            if x < 5 {
                Rgb([20u8, 20, 20])
            } else {
                Rgb([240u8, 240, 240])
            }
        }));
        let params = OcrPreprocess::from(&crate::config::VerifyConfig::default());
        let out = prepare_for_ocr(&img, params);
        assert_eq!(out.dimensions(), (20, 12));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(19, 11)[0], 255);
    }
}
