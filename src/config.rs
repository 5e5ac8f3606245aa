use crate::audio::AudioFormat;
use crate::services::SessionConfig;
use crate::services::session::{DEFAULT_BUFFER_SIZE, DEFAULT_MIN_DURATION};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "pcm-recorder";

/// Overrides the config file location
pub const CONFIG_ENV: &str = "PCM_RECORDER_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Directory receiving one `<unix millis>.pcm` file per session
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: PathBuf,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Capture buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Recordings shorter than this are reported as failed
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,

    /// How long a device read may wait for audio before the source is considered dead
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_recordings_dir() -> PathBuf {
    let data_dir = if let Ok(dir) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(dir)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        PathBuf::from(".")
    };

    data_dir.join(APP_NAME).join("sound")
}

fn default_sample_rate() -> u32 {
    AudioFormat::default().sample_rate
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_min_duration_ms() -> u64 {
    DEFAULT_MIN_DURATION.as_millis() as u64
}

fn default_read_timeout_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recordings_dir: default_recordings_dir(),
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            min_duration_ms: default_min_duration_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.config/pcm-recorder/config.json)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing a default file there if it is missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        tracing::info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(dir)
        } else {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join(APP_NAME).join("config.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.recordings_dir.as_os_str().is_empty() {
            anyhow::bail!("recordings_dir cannot be empty");
        }

        if self.sample_rate == 0 {
            anyhow::bail!("sample_rate must be positive");
        }

        if self.buffer_size == 0 || self.buffer_size % AudioFormat::BYTES_PER_SAMPLE != 0 {
            anyhow::bail!(
                "buffer_size must be a positive multiple of {} bytes",
                AudioFormat::BYTES_PER_SAMPLE
            );
        }

        if self.read_timeout_ms == 0 {
            anyhow::bail!("read_timeout_ms must be positive");
        }

        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            format: AudioFormat::mono(self.sample_rate),
            buffer_size: self.buffer_size,
            min_duration: Duration::from_millis(self.min_duration_ms),
        }
    }
}
