use std::path::PathBuf;
use std::time::Duration;

use sndstrm_services::{PlaybackOptions, MAX_BUFFER_SECS};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub(crate) struct PlayerConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub(crate) struct PlaybackConfig {
    pub buffer_secs: f32,
    pub poll_interval_ms: u64,
    pub volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_secs: 5.0,
            poll_interval_ms: 100,
            volume: 0.2,
        }
    }
}

impl PlaybackConfig {
    pub fn to_options(&self) -> PlaybackOptions {
        PlaybackOptions {
            buffer_secs: self.buffer_secs.max(0.0).min(MAX_BUFFER_SECS),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            volume: self.volume.clamp(0.0, 1.0),
        }
    }
}

pub(crate) fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sndstrm")
        .join("config.toml")
}

pub(crate) fn load_config() -> PlayerConfig {
    let path = config_path();
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| parse_config(&s))
        .unwrap_or_default()
}

fn parse_config(s: &str) -> Option<PlayerConfig> {
    match toml::from_str(s) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed config file");
            None
        }
    }
}
