//! Command-line interface for voxlink
//!
//! Provides argument parsing using clap derive macros.

use crate::audio::cue::Cue;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Real-time voice sessions over WebSocket
#[derive(Parser, Debug)]
#[command(name = "voxlink", version, about = "Real-time voice sessions over WebSocket")]
pub struct Cli {
    /// Subcommand to execute (default: connect to the configured endpoint)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a voice session; type a line and press enter to send it as a command
    Connect(ConnectArgs),

    /// List available audio input and output devices
    Devices,

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Options for a voice session. Unset options come from the config file.
#[derive(clap::Args, Debug, Default, Clone, PartialEq)]
pub struct ConnectArgs {
    /// Endpoint URL (ws:// or wss://)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Audio input device
    #[arg(long, value_name = "DEVICE", conflicts_with = "input_wav")]
    pub input_device: Option<String>,

    /// Audio output device
    #[arg(long, value_name = "DEVICE")]
    pub output_device: Option<String>,

    /// Stream a WAV file instead of the microphone
    #[arg(long, value_name = "FILE")]
    pub input_wav: Option<PathBuf>,

    /// Microphone gain applied before gating
    #[arg(long, value_name = "GAIN")]
    pub gain: Option<f32>,

    /// Peak amplitude below which a block counts as silence (0.0-1.0)
    #[arg(long, value_name = "LEVEL")]
    pub gate: Option<f32>,

    /// Outbound samples buffered before a frame is sent
    #[arg(long, value_name = "SAMPLES")]
    pub flush_samples: Option<usize>,

    /// Play a ping when the session goes live
    #[arg(long)]
    pub cue: bool,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse a cue name typed at the session prompt, e.g. `/cue alert`.
pub fn parse_cue_line(line: &str) -> Option<Result<Cue, String>> {
    let rest = line.trim().strip_prefix("/cue")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim().parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_command() {
        let cli = Cli::try_parse_from(["voxlink"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["voxlink", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_connect_with_options() {
        let cli = Cli::try_parse_from([
            "voxlink",
            "connect",
            "ws://localhost:8000/ws/CENTRAL",
            "--input-device",
            "pipewire",
            "--gain",
            "1.5",
            "--gate",
            "0.1",
            "--flush-samples",
            "8000",
            "--cue",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Connect(args)) => {
                assert_eq!(args.url.as_deref(), Some("ws://localhost:8000/ws/CENTRAL"));
                assert_eq!(args.input_device.as_deref(), Some("pipewire"));
                assert_eq!(args.gain, Some(1.5));
                assert_eq!(args.gate, Some(0.1));
                assert_eq!(args.flush_samples, Some(8000));
                assert!(args.cue);
                assert!(args.output_device.is_none());
            }
            _ => panic!("Expected Connect command"),
        }
    }

    #[test]
    fn test_parse_connect_without_url() {
        let cli = Cli::try_parse_from(["voxlink", "connect"]).unwrap();
        match cli.command {
            Some(Commands::Connect(args)) => assert_eq!(args, ConnectArgs::default()),
            _ => panic!("Expected Connect command"),
        }
    }

    #[test]
    fn test_input_device_conflicts_with_wav() {
        let err = Cli::try_parse_from([
            "voxlink",
            "connect",
            "--input-device",
            "hw:0",
            "--input-wav",
            "speech.wav",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["voxlink", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Show
            })
        ));
    }

    #[test]
    fn test_global_options_after_command() {
        let cli =
            Cli::try_parse_from(["voxlink", "devices", "--config", "/tmp/config.toml", "-q"])
                .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Some(Commands::Devices)));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["voxlink", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Completions { shell: Shell::Bash })
        ));
    }

    #[test]
    fn test_invalid_command_returns_error() {
        let err = Cli::try_parse_from(["voxlink", "invalid"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["voxlink", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_parse_cue_line() {
        assert_eq!(parse_cue_line("/cue alert"), Some(Ok(Cue::Alert)));
        assert_eq!(parse_cue_line("  /cue   start_ping "), Some(Ok(Cue::StartPing)));
        assert!(matches!(parse_cue_line("/cue bogus"), Some(Err(_))));
        assert!(matches!(parse_cue_line("/cue"), Some(Err(_))));
        assert_eq!(parse_cue_line("/cuex"), None);
        assert_eq!(parse_cue_line("hello"), None);
    }
}
