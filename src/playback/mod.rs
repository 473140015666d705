// Media playback handoff
//
// Everything after a code is detected: URL validation, duration probing and
// presenting the full-screen player.

pub mod error;
pub mod handoff;
pub mod media;

pub use error::{HandoffError, MediaError, MediaResult};
pub use handoff::{PlaybackHandoff, PlaybackRequest, default_allowed_schemes};
pub use media::{CommandMedia, MediaCapability, PlayerSurface, ProcessPlayer};
