// Camera error types and result aliases

use thiserror::Error;

/// Result type for camera operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Failures raised while opening or driving the capture session
#[derive(Debug, Error)]
pub enum CameraError {
    /// No rear-facing camera is exposed by the device
    #[error("Device unavailable: no rear camera")]
    DeviceUnavailable,

    /// The camera exists but access was refused
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The camera opened but its input or output could not be attached
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A capture session is already running on this camera
    #[error("Capture already in progress")]
    CaptureInProgress,
}

impl CameraError {
    /// Create a permission error
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
