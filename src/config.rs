// Configuration file support
//
// TOML file with one table per concern. Every field has a default so a partial
// file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::playback::{CommandMedia, PlaybackHandoff, default_allowed_schemes};
use crate::scanner::Symbology;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuickPlayConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Symbologies a scan session reacts to
    #[serde(default = "default_symbologies")]
    pub symbologies: Vec<Symbology>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Delay between frames of a scripted camera (in milliseconds)
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// URL schemes the player may open
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,
    /// Binary used to probe media duration
    #[serde(default = "default_probe_command")]
    pub probe_command: String,
    /// Probe timeout (in seconds); a timeout counts as unknown duration
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Binary used to present the full-screen player
    #[serde(default = "default_player_command")]
    pub player_command: String,
    /// Arguments passed to the player before the media location
    #[serde(default = "default_player_args")]
    pub player_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_symbologies() -> Vec<Symbology> {
    Symbology::default_supported().into_iter().collect()
}
fn default_frame_interval_ms() -> u64 { 100 }
fn default_probe_command() -> String { "ffprobe".to_string() }
fn default_probe_timeout_secs() -> u64 { 10 }
fn default_player_command() -> String { "mpv".to_string() }
fn default_player_args() -> Vec<String> { vec!["--fs".to_string()] }
fn default_log_level() -> String { "info".to_string() }

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbologies: default_symbologies(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: default_allowed_schemes(),
            probe_command: default_probe_command(),
            probe_timeout_secs: default_probe_timeout_secs(),
            player_command: default_player_command(),
            player_args: default_player_args(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl QuickPlayConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: QuickPlayConfig = toml::from_str(&content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Write the default configuration to `path`.
    ///
    /// An existing file is only replaced when `overwrite` is set; its content
    /// is never read, so a broken file can always be reset.
    pub fn write_default<P: AsRef<Path>>(path: P, overwrite: bool) -> ConfigResult<()> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }
        Self::default().save_to_file(path)
    }

    /// Generate a sample configuration file content
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| "# Failed to generate sample configuration".to_string())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.scanner.symbologies.is_empty() {
            errors.push("At least one symbology must be enabled".to_string());
        }

        if self.camera.frame_interval_ms == 0 {
            errors.push("Frame interval must be greater than 0".to_string());
        }

        if self.playback.allowed_schemes.is_empty() {
            errors.push("At least one URL scheme must be allowed".to_string());
        }
        if self.playback.probe_command.trim().is_empty() {
            errors.push("Probe command must not be empty".to_string());
        }
        if self.playback.probe_timeout_secs == 0 {
            errors.push("Probe timeout must be greater than 0".to_string());
        }
        if self.playback.player_command.trim().is_empty() {
            errors.push("Player command must not be empty".to_string());
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "Unknown log level '{}' (expected one of {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Supported symbology set
    pub fn symbologies(&self) -> BTreeSet<Symbology> {
        self.scanner.symbologies.iter().copied().collect()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.camera.frame_interval_ms)
    }

    /// Media capability driving the configured probe and player commands
    pub fn command_media(&self) -> CommandMedia {
        CommandMedia::new(
            self.playback.probe_command.clone(),
            Duration::from_secs(self.playback.probe_timeout_secs),
            self.playback.player_command.clone(),
            self.playback.player_args.clone(),
        )
    }

    pub fn playback_handoff(&self) -> PlaybackHandoff {
        PlaybackHandoff::with_allowed_schemes(
            Arc::new(self.command_media()),
            self.playback.allowed_schemes.clone(),
        )
    }
}
