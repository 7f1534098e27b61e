use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tp_backend::chat::DEFAULT_BASE_URL;
use tracing::warn;

/// Environment variable that overrides `chat.base_url`.
pub const CHAT_URL_ENV: &str = "TRAVELPLAN_CHAT_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub chat: ChatConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Root URL of the chat service.
    pub base_url: String,
    pub connect_timeout_secs: u64,
    /// Timeout for the non-streaming endpoint.
    pub request_timeout_secs: u64,
    /// Overall deadline for a streamed answer. 0 disables it.
    pub stream_deadline_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            stream_deadline_secs: 0,
        }
    }
}

impl ChatConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Deadline for a streamed answer. A command-line value replaces the
    /// configured one, and 0 from either source disables the deadline.
    pub fn stream_deadline(&self, flag: Option<u64>) -> Option<Duration> {
        let secs = flag.unwrap_or(self.stream_deadline_secs);
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Print tool activity and status lines to stderr.
    pub show_progress: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show_progress: true,
        }
    }
}

impl Config {
    /// Read and parse a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Load the user config, falling back to defaults, then apply the
    /// environment override.
    pub fn load_or_default() -> Self {
        let path = config_path();
        let mut config = match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Io(_)) => Config::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring config file");
                Config::default()
            }
        };
        config.apply_env(std::env::var(CHAT_URL_ENV).ok());
        config
    }

    fn apply_env(&mut self, chat_url: Option<String>) {
        if let Some(url) = chat_url.filter(|u| !u.trim().is_empty()) {
            self.chat.base_url = url;
        }
    }
}

pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("travelplan").join("config.toml")
}
