pub mod config;
pub mod playback;
pub mod scanner;
pub mod screen;

pub use config::{ConfigError, QuickPlayConfig};
pub use playback::{HandoffError, PlaybackHandoff, PlaybackRequest};
pub use scanner::{CameraError, ScanSessionController};
pub use screen::{Alert, HomeScreen, ScreenAction, ScreenState, ScreenView};
