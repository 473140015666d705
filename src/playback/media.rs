// Media probe and player capability
//
// The decode/render pipeline is external. `CommandMedia` drives it through
// command-line tools: ffprobe for duration and a configurable player binary.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use url::Url;

use super::{MediaError, MediaResult};

/// Probe and presentation interface for the external media stack
#[async_trait]
pub trait MediaCapability: Send + Sync {
    /// Duration of the media at `url`, or `None` when it cannot be determined
    async fn probe_duration(&self, url: &Url) -> Option<Duration>;

    /// Present a full-screen player bound to `url`.
    ///
    /// Resolves once the player is ready; playback has not started yet.
    async fn present_full_screen_player(&self, url: &Url) -> MediaResult<Box<dyn PlayerSurface>>;
}

/// A presented player
pub trait PlayerSurface: Send {
    fn url(&self) -> &Url;

    /// Begin playback
    fn play(&mut self) -> MediaResult<()>;

    /// Tear the player down. Safe to call more than once.
    fn close(&mut self);
}

/// Media capability backed by external commands
#[derive(Debug, Clone)]
pub struct CommandMedia {
    probe_command: String,
    probe_timeout: Duration,
    player_command: String,
    player_args: Vec<String>,
}

impl CommandMedia {
    pub fn new(
        probe_command: impl Into<String>,
        probe_timeout: Duration,
        player_command: impl Into<String>,
        player_args: Vec<String>,
    ) -> Self {
        Self {
            probe_command: probe_command.into(),
            probe_timeout,
            player_command: player_command.into(),
            player_args,
        }
    }

    async fn run_probe(&self, url: &Url) -> MediaResult<Option<Duration>> {
        let location = media_location(url);
        let output = Command::new(&self.probe_command)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                location.as_str(),
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::probe(format!(
                "{} exited with {}",
                self.probe_command, output.status
            )));
        }

        parse_probe_output(&output.stdout)
    }
}

impl Default for CommandMedia {
    fn default() -> Self {
        Self::new(
            "ffprobe",
            Duration::from_secs(10),
            "mpv",
            vec!["--fs".to_string()],
        )
    }
}

#[async_trait]
impl MediaCapability for CommandMedia {
    async fn probe_duration(&self, url: &Url) -> Option<Duration> {
        match tokio::time::timeout(self.probe_timeout, self.run_probe(url)).await {
            Ok(Ok(duration)) => {
                log::debug!("Probed {}: {:?}", url, duration);
                duration
            }
            Ok(Err(e)) => {
                log::warn!("Failed to probe duration of {}: {}", url, e);
                None
            }
            Err(_) => {
                log::warn!(
                    "Probing {} timed out after {:?}",
                    url,
                    self.probe_timeout
                );
                None
            }
        }
    }

    async fn present_full_screen_player(&self, url: &Url) -> MediaResult<Box<dyn PlayerSurface>> {
        if self.player_command.trim().is_empty() {
            return Err(MediaError::player("no player command configured"));
        }
        Ok(Box::new(ProcessPlayer {
            program: self.player_command.clone(),
            args: self.player_args.clone(),
            url: url.clone(),
            child: None,
        }))
    }
}

/// Player running as a child process
#[derive(Debug)]
pub struct ProcessPlayer {
    program: String,
    args: Vec<String>,
    url: Url,
    child: Option<Child>,
}

impl PlayerSurface for ProcessPlayer {
    fn url(&self) -> &Url {
        &self.url
    }

    fn play(&mut self) -> MediaResult<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(media_location(&self.url))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        log::info!("Playing {} with {}", self.url, self.program);
        self.child = Some(child);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                log::debug!("Player for {} already exited: {}", self.url, e);
            }
        }
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Argument form of `url` for external tools: local paths for `file:` URLs,
/// the URL itself otherwise
fn media_location(url: &Url) -> String {
    if url.scheme() == "file" {
        if let Ok(path) = url.to_file_path() {
            return path.to_string_lossy().into_owned();
        }
    }
    url.to_string()
}

/// Extract `format.duration` from ffprobe's JSON output
fn parse_probe_output(stdout: &[u8]) -> MediaResult<Option<Duration>> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::probe(format!("invalid ffprobe output: {}", e)))?;

    let seconds = match &json["format"]["duration"] {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };

    Ok(seconds.and_then(|s| Duration::try_from_secs_f64(s).ok()))
}
