//! Camera access seam.
//!
//! The orchestrator never talks to a camera API directly. A `CaptureBackend`
//! enumerates devices and opens streams; the returned `CaptureStream` hands
//! out the latest frame and reports its negotiated dimensions so the
//! resolution label can be derived. Stopping a stream must release the
//! hardware immediately and be safe to repeat.

pub mod resolution;
pub mod still;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use resolution::{estimate, ResolutionEstimate, ResolutionSources};
pub use still::{StillCamera, StillStream};

/// One captured frame. Detectors only ever read it.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: Arc<RgbaImage>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
            captured_at: Utc::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn has_pixels(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

/// Pixel dimensions as reported by a track or device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero-sized reports are treated as absent.
    pub fn non_zero(self) -> Option<Self> {
        (self.width > 0 && self.height > 0).then_some(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Whether the label names a rear-facing camera.
    pub fn is_rear_facing(&self) -> bool {
        let label = self.label.to_ascii_lowercase();
        ["back", "rear", "environment"]
            .iter()
            .any(|needle| label.contains(needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    User,
    Environment,
}

/// What to ask the backend for when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    Device(String),
    Facing(FacingMode),
}

impl StreamRequest {
    /// Prefers a rear-labelled device, otherwise asks for an environment-facing camera.
    pub fn prefer_rear(devices: &[DeviceInfo]) -> Self {
        devices
            .iter()
            .find(|device| device.is_rear_facing())
            .map(|device| StreamRequest::Device(device.id.clone()))
            .unwrap_or(StreamRequest::Facing(FacingMode::Environment))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureFault {
    #[error("camera capture is not supported on this device")]
    NotSupported,
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// A camera API.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Whether any capture API exists at all.
    fn is_supported(&self) -> bool {
        true
    }

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CaptureFault>;

    async fn open(&self, request: StreamRequest) -> Result<Arc<dyn CaptureStream>, CaptureFault>;
}

/// An open camera stream.
pub trait CaptureStream: Send + Sync {
    /// Latest delivered frame, if any.
    fn latest_frame(&self) -> Option<Frame>;

    /// Width/height the active track reports in its settings.
    fn track_settings(&self) -> Option<Dimensions>;

    /// Maximum width/height the device advertises.
    fn capabilities(&self) -> Option<Dimensions>;

    /// Intrinsic size of the frames actually being delivered.
    fn playback_size(&self) -> Option<Dimensions> {
        self.latest_frame()
            .and_then(|frame| Dimensions::new(frame.width(), frame.height()).non_zero())
    }

    /// Stops every track. Repeated calls are no-ops.
    fn stop(&self);

    fn is_live(&self) -> bool;
}
