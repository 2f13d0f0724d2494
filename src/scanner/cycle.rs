//! One sampling pass over a frame: crop both regions, run both detectors and
//! pick at most one candidate.

use std::sync::Arc;

use image::{imageops, RgbaImage};

use crate::capture::Frame;
use crate::detect::{extract_text, StructuredDecoder, TextRecognizer};
use crate::geometry::{FrameRegion, ScanRegions};
use crate::validation::{extract_code_from_url, is_valid_candidate};

use super::state::{Candidate, CandidateSource};

// Set to true to trace every cycle
const ENABLE_LOGS: bool = false;

use crate::{log_debug, log_warn};

fn crop(image: &RgbaImage, region: &FrameRegion) -> Option<RgbaImage> {
    if region.is_empty() || region.right() > image.width() || region.bottom() > image.height() {
        return None;
    }
    Some(imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image())
}

/// Runs the structured decoder on the window crop and text recognition on
/// the strip crop, then resolves the outputs.
pub async fn scan_frame(
    frame: &Frame,
    regions: &ScanRegions,
    decoder: Arc<dyn StructuredDecoder>,
    recognizer: &dyn TextRecognizer,
) -> Option<Candidate> {
    let decoded = match crop(&frame.image, &regions.window) {
        Some(window) => {
            match tokio::task::spawn_blocking(move || decoder.decode(&window)).await {
                Ok(decoded) => decoded,
                Err(err) => {
                    log_warn!("structured decode worker failed: {err}");
                    None
                }
            }
        }
        None => None,
    };

    let printed = match crop(&frame.image, &regions.strip) {
        Some(strip) => extract_text(recognizer, &strip).await,
        None => None,
    };

    log_debug!("cycle decoded={:?} printed={:?}", decoded, printed);
    resolve_candidate(printed, decoded)
}

/// Printed text wins over a code pulled from a decoded URL, which wins over a
/// plain decoded payload. Every decoded payload is read as a URL first,
/// scheme or not; whatever comes out must pass the validator.
pub fn resolve_candidate(printed: Option<String>, decoded: Option<String>) -> Option<Candidate> {
    if let Some(text) = printed {
        return Some(Candidate::new(text, CandidateSource::TextRecognition));
    }

    let payload = decoded?;
    let payload = payload.trim();
    if let Some(code) = extract_code_from_url(payload) {
        return Some(Candidate::new(code, CandidateSource::StructuredDecode));
    }

    is_valid_candidate(payload).then(|| Candidate::new(payload, CandidateSource::StructuredDecode))
}
