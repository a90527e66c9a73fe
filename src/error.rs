//! Error types for voxlink.

use crate::session::state::SessionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlinkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio device errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio playback failed: {message}")]
    AudioPlayback { message: String },

    // Transport errors
    #[error("Failed to connect to {url}: {message}")]
    TransportConnect { url: String, message: String },

    #[error("Transport send failed: {message}")]
    TransportSend { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VoxlinkError>;

/// Errors surfaced by the session controller's public API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Microphone or output device unavailable. The session stays Idle.
    #[error("Audio device unavailable: {message}")]
    DeviceAccess { message: String },

    /// The transport could not be opened. The session reverts to Idle.
    #[error("Failed to open transport to {url}: {message}")]
    TransportOpen { url: String, message: String },

    /// The remote side or the network ended the connection.
    #[error("Transport closed unexpectedly: {reason}")]
    TransportClosedUnexpectedly { reason: String },

    /// `start()` was called while a session is active.
    #[error("Session already active (state: {state})")]
    AlreadyLive { state: SessionState },

    /// The session thread could not be spawned. The session reverts to Idle.
    #[error("Failed to start session thread: {message}")]
    SessionThread { message: String },

    /// A control message was sent with no live session.
    #[error("No live session")]
    NotLive,
}
