// Playback error types and result aliases

use thiserror::Error;
use url::Url;

/// Result type for media probe and player operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Reasons a scanned payload cannot be handed to the player
#[derive(Debug, Error)]
pub enum HandoffError {
    /// The payload is not a well-formed absolute URL
    #[error("Malformed payload {payload:?}: {source}")]
    MalformedPayload {
        payload: String,
        #[source]
        source: url::ParseError,
    },

    /// The URL parses but uses a scheme the player is not allowed to open
    #[error("Unsupported URL scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    /// The media has no playable duration (zero, unknown, or probe failed)
    #[error("Unplayable media at {url}")]
    UnplayableMedia { url: Url },
}

/// Failures of the external media probe or player
#[derive(Debug, Error)]
pub enum MediaError {
    /// I/O errors launching external tools
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The duration probe ran but produced no usable answer
    #[error("Probe error: {0}")]
    Probe(String),

    /// The player could not be presented or started
    #[error("Player error: {0}")]
    Player(String),
}

impl MediaError {
    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a player error
    pub fn player(msg: impl Into<String>) -> Self {
        Self::Player(msg.into())
    }
}
