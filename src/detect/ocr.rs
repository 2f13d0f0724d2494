//! Printed-code recognition in the strip beneath the code window.

use std::io::Cursor;
use std::process::Stdio;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::preprocess::prepare_for_recognition;
use crate::validation::is_valid_candidate;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Optical text recognition over a preprocessed black-and-white strip.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image: &GrayImage) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TesseractConfig {
    pub binary: String,
    pub language: String,
    /// Page segmentation mode; 7 treats the strip as a single text line.
    pub page_segmentation_mode: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".into(),
            language: "eng".into(),
            page_segmentation_mode: 7,
        }
    }
}

/// Recognizer backed by the `tesseract` command-line tool.
///
/// The strip is piped in as PNG and the plain-text result read from stdout,
/// so no temporary files are involved.
pub struct TesseractCli {
    config: TesseractConfig,
}

impl TesseractCli {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TextRecognizer for TesseractCli {
    async fn recognize(&self, image: &GrayImage) -> Result<String> {
        let png = {
            let image = image.clone();
            tokio::task::spawn_blocking(move || encode_png(image))
                .await
                .context("png encoder worker join failed")??
        };

        let mut child = Command::new(&self.config.binary)
            .args(["stdin", "stdout", "-l", self.config.language.as_str(), "--psm"])
            .arg(self.config.page_segmentation_mode.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.config.binary))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("tesseract stdin unavailable"))?;
        stdin
            .write_all(&png)
            .await
            .context("failed to stream strip to tesseract")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("tesseract did not finish")?;
        if !output.status.success() {
            bail!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn encode_png(image: GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode strip as png")?;
    Ok(buffer.into_inner())
}

/// Splits recognizer output on non-alphanumeric runs.
pub fn tokenize(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
}

/// Longest token accepted by the validator; the earliest one wins ties.
pub fn best_token(raw: &str) -> Option<String> {
    tokenize(raw)
        .filter(|token| is_valid_candidate(token))
        .fold(None::<&str>, |best, token| match best {
            Some(current) if current.len() >= token.len() => Some(current),
            _ => Some(token),
        })
        .map(str::to_string)
}

/// Preprocesses `strip`, runs recognition and ranks the tokens.
///
/// Recognizer failures are logged and reported as no result.
pub async fn extract_text(recognizer: &dyn TextRecognizer, strip: &RgbaImage) -> Option<String> {
    if strip.width() == 0 || strip.height() == 0 {
        return None;
    }

    let prepared = {
        let strip = strip.clone();
        match tokio::task::spawn_blocking(move || prepare_for_recognition(&strip)).await {
            Ok(prepared) => prepared,
            Err(err) => {
                log_warn!("strip preprocessing worker failed: {err}");
                return None;
            }
        }
    };

    let raw = match recognizer.recognize(&prepared).await {
        Ok(text) => text,
        Err(err) => {
            log_warn!("text recognition failed: {err:#}");
            return None;
        }
    };

    let best = best_token(&raw);
    log_debug!("ocr raw={:?} best={:?}", raw.trim(), best);
    best
}
