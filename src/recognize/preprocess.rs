//! Image conditioning before text recognition.

use image::imageops::FilterType;
use image::{ImageBuffer, Luma, Rgba};

/// Binarization threshold on the contrast-stretched grayscale image.
pub const DEFAULT_THRESHOLD: u8 = 150;

/// Recognition gets unstable below roughly this glyph height; smaller crops
/// are upscaled by an integer factor first.
pub const MIN_OCR_HEIGHT: u32 = 32;

/// Full conditioning pipeline: upscale, grayscale, contrast stretch,
/// binarize.
pub fn prepare(
    img: &ImageBuffer<Rgba<u8>, Vec<u8>>,
    threshold: u8,
) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let upscaled = upscale_for_ocr(img);
    let gray = to_grayscale(&upscaled);
    let stretched = stretch_contrast(&gray);
    binarize(&stretched, threshold)
}

/// Scales the image up by the smallest integer factor that brings its height
/// to [`MIN_OCR_HEIGHT`]. Already-large images pass through untouched.
pub fn upscale_for_ocr(img: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> ImageBuffer<Rgba<u8>, Vec<u8>> {
    let height = img.height();
    if height == 0 || height >= MIN_OCR_HEIGHT {
        return img.clone();
    }
    let factor = MIN_OCR_HEIGHT.div_ceil(height);
    image::imageops::resize(
        img,
        img.width() * factor,
        height * factor,
        FilterType::Lanczos3,
    )
}

/// BT.601 luma conversion, matching how the trigger brightness probe weighs
/// channels.
pub fn to_grayscale(img: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let (width, height) = img.dimensions();
    let mut out = ImageBuffer::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        let luma = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
        out.put_pixel(x, y, Luma([luma as u8]));
    }
    out
}

/// Linear contrast stretch over the observed min/max. A flat image (min ==
/// max) passes through unchanged.
pub fn stretch_contrast(img: &ImageBuffer<Luma<u8>, Vec<u8>>) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if min >= max {
        return img.clone();
    }
    let range = (max - min) as f32;
    let (width, height) = img.dimensions();
    let mut out = ImageBuffer::new(width, height);
    for (x, y, p) in img.enumerate_pixels() {
        let v = ((p[0] - min) as f32 / range * 255.0) as u8;
        out.put_pixel(x, y, Luma([v]));
    }
    out
}

/// Binarizes to black text on a white background.
///
/// Bright pixels above the threshold become black (text) on the assumption
/// of light-on-dark UI numerals; if that leaves a majority-black image the
/// polarity was wrong and the output is inverted.
pub fn binarize(
    img: &ImageBuffer<Luma<u8>, Vec<u8>>,
    threshold: u8,
) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    let (width, height) = img.dimensions();
    let mut out = ImageBuffer::new(width, height);
    let mut black: u64 = 0;
    for (x, y, p) in img.enumerate_pixels() {
        let value = if p[0] > threshold { 0u8 } else { 255u8 };
        if value == 0 {
            black += 1;
        }
        out.put_pixel(x, y, Luma([value]));
    }

    let total = width as u64 * height as u64;
    if total > 0 && black * 2 > total {
        for p in out.pixels_mut() {
            p[0] = 255 - p[0];
        }
    }
    out
}

/// Mean BT.601 luma of a region, 0.0 (black) to 255.0 (white). Used to tell
/// whether a trigger region is lit before spending an OCR pass on it.
pub fn mean_luma(img: &ImageBuffer<Rgba<u8>, Vec<u8>>) -> f32 {
    if img.width() == 0 || img.height() == 0 {
        return 0.0;
    }
    let mut total: f64 = 0.0;
    for pixel in img.pixels() {
        total +=
            0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
    }
    (total / (img.width() as f64 * img.height() as f64)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upscale_small_image() {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(50, 12);
        let up = upscale_for_ocr(&img);
        // 12 -> factor 3 -> 36 high.
        assert_eq!(up.dimensions(), (150, 36));
    }

    #[test]
    fn test_upscale_leaves_large_image_alone() {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(100, 40);
        assert_eq!(upscale_for_ocr(&img).dimensions(), (100, 40));
    }

    #[test]
    fn test_stretch_contrast_expands_range() {
        let mut img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::new(2, 1);
        img.put_pixel(0, 0, Luma([100]));
        img.put_pixel(1, 0, Luma([150]));

        let out = stretch_contrast(&img);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_binarize_bright_text_goes_black() {
        let mut img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::new(3, 1);
        img.put_pixel(0, 0, Luma([250]));
        img.put_pixel(1, 0, Luma([40]));
        img.put_pixel(2, 0, Luma([40]));

        let out = binarize(&img, 150);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_binarize_inverts_majority_black() {
        // Mostly bright image: naive polarity would be mostly black text.
        let mut img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::new(4, 1);
        img.put_pixel(0, 0, Luma([250]));
        img.put_pixel(1, 0, Luma([250]));
        img.put_pixel(2, 0, Luma([250]));
        img.put_pixel(3, 0, Luma([40]));

        let out = binarize(&img, 150);
        // Inverted back: the bright background is white, the dark glyph black.
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        assert_eq!(out.get_pixel(3, 0)[0], 0);
    }

    #[test]
    fn test_mean_luma_bounds() {
        let white: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let black: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        assert!(mean_luma(&white) > 254.0);
        assert!(mean_luma(&black) < 1.0);
    }
}
