//! voxlink - Real-time voice sessions over WebSocket
//!
//! Streams gated, downsampled microphone audio to a conversational endpoint
//! and plays its spoken replies in order, with barge-in preemption.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod call_log;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod sys;
pub mod transport;

// Device seams (microphone → capture, playback → output)
pub use audio::devices::{AudioDevices, InputSelection, MockDevices};
pub use audio::frame::AudioFrame;
pub use audio::sink::{AudioOutput, MockOutput, Renderer};
pub use audio::source::{MicrophoneSource, MockMicrophone};
pub use call_log::CallLog;

// Session
pub use session::{SessionConfig, SessionController, SessionEvent, SessionState};

// Transport
pub use transport::{Connector, MockConnector, MockRemote, Transport, WebSocketConnector};

// Error handling
pub use error::{Result, SessionError, VoxlinkError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", hash_part);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
