use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::kernel::reply::PhraseClip;

pub const ENV_BASE_URL: &str = "RINGBACK_BASE_URL";
pub const ENV_VAPID_PUBLIC_KEY: &str = "RINGBACK_VAPID_PUBLIC_KEY";

/// Polling faster than this turns the poll loop into a busy loop against the server.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub call: String,
    pub subscribe: String,
    pub poll_reply: String,
    pub reply: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            call: "/api/call".to_string(),
            subscribe: "/api/subscribe".to_string(),
            poll_reply: "/api/poll_reply".to_string(),
            reply: "/api/reply".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Path under `base_url` that the background agent controls.
    pub scope: String,
    pub endpoints: Endpoints,

    /// Press duration that turns a tap into a voice recording.
    pub hold_ms: u64,
    pub hold_progress_ms: u64,
    pub cooldown_ms: u64,

    pub ring_period_ms: u64,
    pub ring_safety_ms: u64,

    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,

    pub request_timeout_ms: u64,

    pub vapid_public_key: Option<String>,
    pub phrase_clips: Vec<PhraseClip>,

    pub player_cmd: Vec<String>,
    pub speech_cmd: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            scope: "/".to_string(),
            endpoints: Endpoints::default(),
            hold_ms: 400,
            hold_progress_ms: 50,
            cooldown_ms: 5_000,
            ring_period_ms: 1_500,
            ring_safety_ms: 30_000,
            poll_interval_ms: 2_000,
            poll_max_attempts: 300, // 10 minutes at the default interval
            request_timeout_ms: 10_000,
            vapid_public_key: None,
            phrase_clips: PhraseClip::default_table(),
            player_cmd: vec!["ffplay".into(), "-nodisp".into(), "-autoexit".into()],
            speech_cmd: vec!["say".into()],
        }
    }
}

impl ClientConfig {
    /// Reads the JSON file if one is given, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => ClientConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(key) = lookup(ENV_VAPID_PUBLIC_KEY).filter(|v| !v.trim().is_empty()) {
            self.vapid_public_key = Some(key.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hold_ms == 0 {
            return Err(ConfigError::Invalid("hold_ms must be greater than zero".into()));
        }
        if self.hold_progress_ms == 0 {
            return Err(ConfigError::Invalid("hold_progress_ms must be greater than zero".into()));
        }
        if self.ring_period_ms == 0 {
            return Err(ConfigError::Invalid("ring_period_ms must be greater than zero".into()));
        }
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        if self.poll_max_attempts == 0 {
            return Err(ConfigError::Invalid("poll_max_attempts must be greater than zero".into()));
        }
        self.scope_url()?;
        Ok(())
    }

    pub fn scope_url(&self) -> Result<reqwest::Url, ConfigError> {
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url {:?}: {e}", self.base_url)))?;
        base.join(&self.scope)
            .map_err(|e| ConfigError::Invalid(format!("scope {:?}: {e}", self.scope)))
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn hold_progress(&self) -> Duration {
        Duration::from_millis(self.hold_progress_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn ring_period(&self) -> Duration {
        Duration::from_millis(self.ring_period_ms)
    }

    pub fn ring_safety(&self) -> Duration {
        Duration::from_millis(self.ring_safety_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
