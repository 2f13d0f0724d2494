use thiserror::Error;

use crate::capture::CaptureFault;

/// Reasons a scan could not start. The display text is the user-facing status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("Camera requires HTTPS. Use your tunnel link.")]
    InsecureContext,
    #[error("Camera not available. Please use manual entry.")]
    CaptureUnsupported,
    #[error("Camera access was denied. Please allow camera access or use manual entry.")]
    PermissionDenied(String),
    #[error("Camera not available. Please use manual entry.")]
    DeviceUnavailable(String),
}

impl From<CaptureFault> for ScanError {
    fn from(fault: CaptureFault) -> Self {
        match fault {
            CaptureFault::NotSupported => ScanError::CaptureUnsupported,
            CaptureFault::PermissionDenied(detail) => ScanError::PermissionDenied(detail),
            CaptureFault::Unavailable(detail) => ScanError::DeviceUnavailable(detail),
        }
    }
}
