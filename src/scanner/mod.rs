// Camera scanning
//
// Turns a live camera feed into at most one detected code per scan session.

pub mod camera;
pub mod controller;
pub mod error;
pub mod types;

pub use camera::{CameraCapability, CameraFault, CameraHandle, FrameSubscription, ScriptedCamera};
pub use controller::ScanSessionController;
pub use error::{CameraError, CameraResult};
pub use types::*;

use uuid::Uuid;

pub type SessionId = Uuid;
