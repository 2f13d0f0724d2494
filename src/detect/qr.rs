//! Structured-code decoding inside the code window.

use image::{GrayImage, RgbaImage};
use rqrr::PreparedImage;

use super::preprocess::luma_plane;

// Set to true to trace every decode attempt
const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Decodes a machine-readable code from a crop of frame pixels.
///
/// Absence of a code is a normal outcome and is reported as `None`.
pub trait StructuredDecoder: Send + Sync {
    fn decode(&self, pixels: &RgbaImage) -> Option<String>;
}

/// QR decoder that tries both print polarities.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

impl QrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl StructuredDecoder for QrDecoder {
    fn decode(&self, pixels: &RgbaImage) -> Option<String> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }

        let luma = luma_plane(pixels);
        decode_luma(&luma, false).or_else(|| decode_luma(&luma, true))
    }
}

/// Decodes a tightly packed RGBA buffer of `width × height` pixels.
pub fn decode(pixels: &[u8], width: u32, height: u32) -> Option<String> {
    let expected = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)?;
    if expected == 0 || pixels.len() < expected {
        return None;
    }
    let image = RgbaImage::from_raw(width, height, pixels[..expected].to_vec())?;
    QrDecoder.decode(&image)
}

fn decode_luma(luma: &GrayImage, inverted: bool) -> Option<String> {
    let (w, h) = (luma.width() as usize, luma.height() as usize);
    let mut prepared = PreparedImage::prepare_from_greyscale(w, h, |x, y| {
        let value = luma.get_pixel(x as u32, y as u32).0[0];
        if inverted {
            255 - value
        } else {
            value
        }
    });

    let grids = prepared.detect_grids();
    log_debug!("qr: {} candidate grid(s), inverted={}", grids.len(), inverted);

    grids.iter().find_map(|grid| match grid.decode() {
        Ok((_, content)) => Some(content),
        Err(err) => {
            log_debug!("qr: grid decode failed: {err:?}");
            None
        }
    })
}
