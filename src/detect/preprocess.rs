//! Pixel preparation for the printed-code recognizer.
//!
//! Printed codes sit on a reflective curved surface. A hard contrast stretch
//! followed by a fixed threshold leaves the glyphs black on white, which the
//! recognizer handles far better than the raw crop.

use image::{GrayImage, Luma, RgbaImage};

const STRETCH_PIVOT: f32 = 110.0;
const STRETCH_GAIN: f32 = 2.2;
const BINARY_THRESHOLD: f32 = 150.0;

/// ITU-R BT.601 luma.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

/// `clamp((L - 110) * 2.2, 0, 255)`
#[inline]
pub fn contrast_stretch(luma: f32) -> f32 {
    ((luma - STRETCH_PIVOT) * STRETCH_GAIN).clamp(0.0, 255.0)
}

#[inline]
pub fn binarize(stretched: f32) -> u8 {
    if stretched > BINARY_THRESHOLD {
        255
    } else {
        0
    }
}

/// Grayscale, stretch and threshold every pixel of `strip`.
pub fn prepare_for_recognition(strip: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(strip.width(), strip.height(), |x, y| {
        let [r, g, b, _] = strip.get_pixel(x, y).0;
        Luma([binarize(contrast_stretch(luminance(r, g, b)))])
    })
}

/// Plain luma plane of an RGBA crop, used by the structured decoder.
pub fn luma_plane(pixels: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(pixels.width(), pixels.height(), |x, y| {
        let [r, g, b, _] = pixels.get_pixel(x, y).0;
        Luma([luminance(r, g, b).round().clamp(0.0, 255.0) as u8])
    })
}
