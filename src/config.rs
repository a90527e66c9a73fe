use crate::defaults;
use crate::error::{Result, VoxlinkError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub transport: TransportConfig,
    pub session: SessionSection,
}

/// Audio devices and capture tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    /// Samples per capture block at the device rate.
    pub block_size: usize,
    pub gain: f32,
    pub gate_threshold: f32,
    /// Outbound samples buffered before a flush.
    pub flush_threshold: usize,
    /// Blocks between microphone level log lines (0 disables).
    pub level_log_interval: u64,
}

/// Endpoint and wire format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub endpoint: String,
    pub outbound_sample_rate: u32,
    pub inbound_sample_rate: u32,
    pub connect_timeout_ms: u64,
}

/// Session behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    /// Play a short ping when a session goes live.
    pub start_cue: bool,
    pub block_buffer: usize,
    pub event_buffer: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            block_size: defaults::BLOCK_SIZE,
            gain: defaults::GAIN,
            gate_threshold: defaults::GATE_THRESHOLD,
            flush_threshold: defaults::FLUSH_THRESHOLD,
            level_log_interval: defaults::LEVEL_LOG_INTERVAL,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENDPOINT.to_string(),
            outbound_sample_rate: defaults::OUTBOUND_SAMPLE_RATE,
            inbound_sample_rate: defaults::INBOUND_SAMPLE_RATE,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            start_cue: false,
            block_buffer: defaults::BLOCK_BUFFER,
            event_buffer: defaults::EVENT_BUFFER,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only if the file is missing.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(VoxlinkError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLINK_ENDPOINT → transport.endpoint
    /// - VOXLINK_INPUT_DEVICE → audio.input_device
    /// - VOXLINK_OUTPUT_DEVICE → audio.output_device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("VOXLINK_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.transport.endpoint = endpoint;
        }

        if let Ok(device) = std::env::var("VOXLINK_INPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.input_device = Some(device);
        }

        if let Ok(device) = std::env::var("VOXLINK_OUTPUT_DEVICE")
            && !device.is_empty()
        {
            self.audio.output_device = Some(device);
        }

        self
    }

    /// Reject values the pipelines cannot run with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> VoxlinkError {
            VoxlinkError::ConfigInvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            }
        }

        let audio = &self.audio;
        if !(audio.gain.is_finite() && audio.gain > 0.0) {
            return Err(invalid("audio.gain", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&audio.gate_threshold) {
            return Err(invalid("audio.gate_threshold", "must be between 0.0 and 1.0"));
        }
        if audio.block_size == 0 {
            return Err(invalid("audio.block_size", "must be greater than 0"));
        }
        if audio.flush_threshold == 0 {
            return Err(invalid("audio.flush_threshold", "must be greater than 0"));
        }

        let transport = &self.transport;
        if !(transport.endpoint.starts_with("ws://") || transport.endpoint.starts_with("wss://"))
        {
            return Err(invalid(
                "transport.endpoint",
                "must be a ws:// or wss:// URL",
            ));
        }
        if transport.outbound_sample_rate == 0 {
            return Err(invalid("transport.outbound_sample_rate", "must be greater than 0"));
        }
        if transport.inbound_sample_rate == 0 {
            return Err(invalid("transport.inbound_sample_rate", "must be greater than 0"));
        }
        if transport.connect_timeout_ms == 0 {
            return Err(invalid("transport.connect_timeout_ms", "must be greater than 0"));
        }

        if self.session.block_buffer == 0 {
            return Err(invalid("session.block_buffer", "must be greater than 0"));
        }
        if self.session.event_buffer == 0 {
            return Err(invalid("session.event_buffer", "must be greater than 0"));
        }

        Ok(())
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VoxlinkError::Other(e.to_string()))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxlink/config.toml on Linux, or None when the
    /// platform has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("voxlink").join("config.toml"))
    }
}
