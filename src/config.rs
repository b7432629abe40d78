//! Application configuration
//!
//! Loaded from a TOML file; every field has a default so a partial file (or
//! none at all) is valid.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::CapacityPolicy;
use crate::constants::*;
use crate::error::Error;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub batch: BatchConfig,
    pub playback: PlaybackConfig,
}

/// Where the byte stream comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `host:port` of the streaming server
    pub address: String,
    /// Upper bound on bytes handed over per read
    pub chunk_size: usize,
    /// Socket receive buffer; OS default when unset
    pub recv_buffer_size: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", DEFAULT_STREAM_PORT),
            chunk_size: DEFAULT_CHUNK_SIZE,
            recv_buffer_size: None,
        }
    }
}

/// Super-frame batching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Super-frame capacity in bytes
    pub capacity: usize,
    pub policy: CapacityPolicy,
    /// Decode the partial super-frame left at end of stream
    pub flush_on_end: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity: SUPER_FRAME_CAPACITY,
            policy: CapacityPolicy::default(),
            flush_on_end: true,
        }
    }
}

/// Playback scheduling and output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Segments that must be queued behind the one being started
    pub lookahead: usize,
    /// Output sink
    pub sink: SinkKind,
    /// Capacity of the segment channel between decoder and scheduler
    pub channel_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            sink: SinkKind::default(),
            channel_capacity: DEFAULT_PLAYBACK_QUEUE,
        }
    }
}

/// Available audio sinks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Real-time paced output with no device
    #[default]
    Clock,
    /// Default output device (requires the `cpal` feature)
    Device,
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file at `path`, or the default location, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    tracing::debug!("No configuration file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        tracing::info!("Loading configuration from {}", path.display());
        Self::load(&path)
    }

    /// Platform configuration file location
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "gapless-stream").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, Error> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), Error> {
        if self.batch.capacity == 0 {
            return Err(Error::Config("batch.capacity must be greater than zero".into()));
        }
        if self.source.chunk_size == 0 {
            return Err(Error::Config("source.chunk_size must be greater than zero".into()));
        }
        if self.playback.channel_capacity == 0 {
            return Err(Error::Config("playback.channel_capacity must be greater than zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.batch.capacity, 384 * 128);
        assert_eq!(config.batch.policy, CapacityPolicy::FlushEarly);
        assert_eq!(config.playback.lookahead, 1);
        assert_eq!(config.source.address, "127.0.0.1:3615");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            [source]
            address = "10.0.0.2:3615"

            [batch]
            capacity = 200
            policy = "grow"

            [playback]
            sink = "device"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.address, "10.0.0.2:3615");
        assert_eq!(config.source.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.batch.capacity, 200);
        assert_eq!(config.batch.policy, CapacityPolicy::Grow);
        assert!(config.batch.flush_on_end);
        assert_eq!(config.playback.sink, SinkKind::Device);
    }

    #[test]
    fn test_toml_roundtrip_keeps_policy() {
        let mut config = AppConfig::default();
        config.batch.policy = CapacityPolicy::Strict;
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.batch.policy, CapacityPolicy::Strict);
    }

    #[test]
    fn test_invalid_values() {
        let config = AppConfig::from_toml("[batch]\ncapacity = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(AppConfig::from_toml("[batch]\npolicy = \"explode\"\n").is_err());
    }
}
