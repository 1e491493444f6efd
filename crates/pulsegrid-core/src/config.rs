//! Configuration file support for pulsegrid
//!
//! Configuration is stored in TOML format at:
//! - Linux: `~/.config/pulsegrid/config.toml`
//! - macOS: `~/Library/Application Support/pulsegrid/config.toml`
//! - Windows: `%APPDATA%\pulsegrid\config.toml`

use crate::error::{Error, Result};
use crate::timing::{
    clamp_tempo, SessionSettings, DEFAULT_BPM, FLASH_DURATION, LOOKAHEAD_SECS,
    MIN_TICK_INTERVAL, STARTUP_OFFSET_SECS, TICK_INTERVAL,
};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tempo and scheduler timing
    pub transport: TransportSettings,
    /// Output device
    pub audio: AudioSettings,
    /// Where sounds come from
    pub catalog: CatalogSettings,
}

impl Config {
    /// Load configuration from the default config file location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Err(Error::Config(format!("Config file not found at {:?}", path)))
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration or return default if not found
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Save configuration to the default config file location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = ProjectDirs::from("", "", "pulsegrid") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Err(Error::Config("Could not determine config directory".to_string()))
        }
    }

    /// Create a default config file with comments
    pub fn create_default_config_file() -> Result<PathBuf> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, DEFAULT_CONFIG)?;
        Ok(path)
    }

    /// Convert to the runtime settings a `Session` is built with
    pub fn scheduler_settings(&self) -> SessionSettings {
        let t = &self.transport;
        SessionSettings {
            bpm: clamp_tempo(t.bpm),
            lookahead_secs: t.lookahead_ms as f64 / 1000.0,
            tick_interval: Duration::from_millis(t.tick_interval_ms).max(MIN_TICK_INTERVAL),
            startup_offset_secs: t.startup_offset_ms as f64 / 1000.0,
            flash_duration: Duration::from_millis(t.flash_ms),
            master_gain: self.audio.master_gain.clamp(0.0, 2.0),
        }
    }
}

const DEFAULT_CONFIG: &str = r#"# pulsegrid configuration file

[transport]
# Start tempo in BPM (72-148)
bpm = 120.0

# How far ahead of the audio clock steps are scheduled
lookahead_ms = 160

# Scheduler tick period
tick_interval_ms = 25

# Delay between pressing start and the first step
startup_offset_ms = 50

# How long a triggered cell stays highlighted
flash_ms = 300

[audio]
# Output device name as shown by `pulsegrid devices` (default device if unset)
# output_device = "Built-in Output"

# Master gain, linear (0.0-2.0)
master_gain = 1.0

[catalog]
# Sound manifest (JSON list of {id, label, category, source})
manifest = "sounds.json"

# Directory sound sources are resolved against (manifest directory if unset)
# sounds_dir = "sounds"
"#;

/// `[transport]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub bpm: f64,
    pub lookahead_ms: u64,
    pub tick_interval_ms: u64,
    pub startup_offset_ms: u64,
    pub flash_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            lookahead_ms: (LOOKAHEAD_SECS * 1000.0) as u64,
            tick_interval_ms: TICK_INTERVAL.as_millis() as u64,
            startup_offset_ms: (STARTUP_OFFSET_SECS * 1000.0) as u64,
            flash_ms: FLASH_DURATION.as_millis() as u64,
        }
    }
}

/// `[audio]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_device: Option<String>,
    pub master_gain: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            output_device: None,
            master_gain: 1.0,
        }
    }
}

/// `[catalog]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub manifest: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sounds_dir: Option<PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("sounds.json"),
            sounds_dir: None,
        }
    }
}

impl CatalogSettings {
    /// Base directory for sound locators: `sounds_dir`, else the manifest's
    /// directory.
    pub fn resolved_sounds_dir(&self) -> PathBuf {
        match &self.sounds_dir {
            Some(dir) => dir.clone(),
            None => self
                .manifest
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }
}
