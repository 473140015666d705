// Playback handoff: scanned payload -> validated URL -> full-screen player

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

use super::{HandoffError, MediaCapability, PlayerSurface};

/// A payload that has been turned into something the player can open
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub source_url: Url,
    pub duration: Option<Duration>,
    pub resolved: bool,
}

impl PlaybackRequest {
    /// Request whose media has not been probed yet
    pub fn new(source_url: Url) -> Self {
        Self {
            source_url,
            duration: None,
            resolved: false,
        }
    }

    pub fn resolved(source_url: Url, duration: Duration) -> Self {
        Self {
            source_url,
            duration: Some(duration),
            resolved: true,
        }
    }
}

pub fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string(), "file".to_string()]
}

#[derive(Default)]
struct PlayerSlot {
    generation: u64,
    player: Option<Box<dyn PlayerSurface>>,
}

/// Resolves scanned payloads and hands them to the media player
pub struct PlaybackHandoff {
    media: Arc<dyn MediaCapability>,
    allowed_schemes: Vec<String>,
    slot: Arc<Mutex<PlayerSlot>>,
}

impl PlaybackHandoff {
    pub fn new(media: Arc<dyn MediaCapability>) -> Self {
        Self::with_allowed_schemes(media, default_allowed_schemes())
    }

    pub fn with_allowed_schemes(media: Arc<dyn MediaCapability>, allowed_schemes: Vec<String>) -> Self {
        Self {
            media,
            allowed_schemes,
            slot: Arc::new(Mutex::new(PlayerSlot::default())),
        }
    }

    /// Parse `value` as a URL and check that it addresses playable media
    pub async fn resolve(&self, value: &str) -> Result<PlaybackRequest, HandoffError> {
        let payload = value.trim();
        let url = Url::parse(payload).map_err(|source| HandoffError::MalformedPayload {
            payload: payload.to_string(),
            source,
        })?;

        if !self
            .allowed_schemes
            .iter()
            .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme()))
        {
            return Err(HandoffError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        match self.media.probe_duration(&url).await {
            Some(duration) if !duration.is_zero() => {
                log::debug!("Resolved {} ({:?})", url, duration);
                Ok(PlaybackRequest::resolved(url, duration))
            }
            _ => Err(HandoffError::UnplayableMedia { url }),
        }
    }

    /// Open a full-screen player for `request` and start playback as soon as it
    /// is ready.
    ///
    /// Presentation runs in the background. The returned handle resolves to
    /// `true` once the player is on screen and playing, and to `false` when it
    /// could not be presented or was dismissed first. Failures are logged.
    pub fn present(&self, request: PlaybackRequest) -> JoinHandle<bool> {
        let media = Arc::clone(&self.media);
        let slot = Arc::clone(&self.slot);
        let generation = {
            let mut slot = lock(&self.slot);
            slot.generation += 1;
            slot.generation
        };

        tokio::spawn(async move {
            let url = request.source_url;
            let mut player = match media.present_full_screen_player(&url).await {
                Ok(player) => player,
                Err(e) => {
                    log::warn!("Failed to present player for {}: {}", url, e);
                    return false;
                }
            };

            let mut slot = lock(&slot);
            if slot.generation != generation {
                log::debug!("Presentation of {} was superseded", url);
                player.close();
                return false;
            }

            if let Err(e) = player.play() {
                log::warn!("Failed to start playback of {}: {}", url, e);
                player.close();
                return false;
            }
            if let Some(mut previous) = slot.player.replace(player) {
                previous.close();
            }
            true
        })
    }

    /// Close the active player, including one still being presented
    pub fn dismiss(&self) {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        if let Some(mut player) = slot.player.take() {
            log::info!("Closing player for {}", player.url());
            player.close();
        }
    }

    /// URL of the player currently on screen
    pub fn now_playing(&self) -> Option<Url> {
        lock(&self.slot).player.as_ref().map(|player| player.url().clone())
    }
}

impl Drop for PlaybackHandoff {
    fn drop(&mut self) {
        self.dismiss();
    }
}

fn lock(slot: &Mutex<PlayerSlot>) -> MutexGuard<'_, PlayerSlot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
