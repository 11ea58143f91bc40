//! Configuration loading for the voice core
//!
//! Settings come from a TOML file when one exists; every field has a
//! compiled default so the core runs unconfigured.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Voice session and playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    /// Bounded wait for a new session to reach Ready, in seconds
    pub connect_timeout_secs: u64,

    /// Grace window for transport auto-recovery after a drop, in seconds
    pub reconnect_grace_secs: u64,

    /// Root folder holding per-guild audio assets
    pub audio_root: PathBuf,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            reconnect_grace_secs: 5,
            audio_root: PathBuf::from("./resources/audio"),
        }
    }
}

impl VoiceSettings {
    /// Bounded wait for a new session to reach Ready
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Grace window for transport auto-recovery after a drop
    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load settings from a TOML file, falling back to defaults when the
    /// file is missing or malformed
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load {}: {}; using defaults", path.display(), e);
                Self::default()
            }
        }
    }
}
