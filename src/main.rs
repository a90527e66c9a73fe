use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxlink::audio::devices::{CpalDevices, InputSelection, list_input_devices, list_output_devices};
use voxlink::cli::{Cli, Commands, ConfigAction, ConnectArgs, parse_cue_line};
use voxlink::config::Config;
use voxlink::error::SessionError;
use voxlink::session::{SessionConfig, SessionController, SessionEvent};
use voxlink::transport::WebSocketConnector;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match cli.command {
        None => {
            run_connect(cli.config.as_deref(), ConnectArgs::default(), cli.quiet).await?;
        }
        Some(Commands::Connect(args)) => {
            run_connect(cli.config.as_deref(), args, cli.quiet).await?;
        }
        Some(Commands::Devices) => {
            list_audio_devices()?;
        }
        Some(Commands::Config { action }) => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "voxlink", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over -q/-v.
fn init_tracing(quiet: bool, verbose: u8) {
    let default_filter = match (quiet, verbose) {
        (true, _) => "voxlink=warn",
        (false, 0) => "voxlink=info",
        (false, 1) => "voxlink=debug",
        (false, _) => "voxlink=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxlink/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides apply on top of all three.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };

    Ok(config.with_env_overrides())
}

/// Overlay command-line options on the loaded configuration.
fn apply_connect_args(config: &mut Config, args: &ConnectArgs) {
    if let Some(url) = &args.url {
        config.transport.endpoint = url.clone();
    }
    if let Some(device) = &args.input_device {
        config.audio.input_device = Some(device.clone());
    }
    if let Some(device) = &args.output_device {
        config.audio.output_device = Some(device.clone());
    }
    if let Some(gain) = args.gain {
        config.audio.gain = gain;
    }
    if let Some(gate) = args.gate {
        config.audio.gate_threshold = gate;
    }
    if let Some(samples) = args.flush_samples {
        config.audio.flush_threshold = samples;
    }
    if args.cue {
        config.session.start_cue = true;
    }
}

/// Run one voice session until Ctrl+C or the endpoint disconnects.
async fn run_connect(config_path: Option<&Path>, args: ConnectArgs, quiet: bool) -> Result<()> {
    voxlink::sys::suppress_audio_warnings();

    let mut config = load_config(config_path)?;
    apply_connect_args(&mut config, &args);
    config.validate()?;

    let input = match &args.input_wav {
        Some(path) => InputSelection::Wav(path.clone()),
        None => InputSelection::Device(config.audio.input_device.clone()),
    };
    let devices = CpalDevices::new(
        input,
        config.audio.output_device.clone(),
        config.audio.block_size,
    );
    let connector =
        WebSocketConnector::new(Duration::from_millis(config.transport.connect_timeout_ms));

    let mut controller = SessionController::new(
        SessionConfig::from(&config),
        Arc::new(devices),
        Arc::new(connector),
    );
    controller.on_text_received(|text| {
        println!("{} {}", "<".cyan().bold(), text);
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let session_events = controller.events();
    std::thread::Builder::new()
        .name("voxlink-events".to_string())
        .spawn(move || {
            for event in session_events.iter() {
                if event_tx.send(event).is_err() {
                    break;
                }
            }
        })?;

    let url = config.transport.endpoint.clone();
    if !quiet {
        eprintln!("Connecting to {}...", url);
    }
    let mut controller = tokio::task::spawn_blocking(move || {
        controller.start(&url).map(|()| controller)
    })
    .await??;

    if !quiet {
        eprintln!(
            "{} Type a command and press enter; /cue <name> plays a tone; Ctrl+C ends the session.",
            "Live.".green().bold()
        );
    }

    let mut lines = spawn_stdin_reader()?;
    let mut stdin_open = true;
    let mut disconnected = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nStopping...");
                }
                break;
            }
            event = event_rx.recv() => match event {
                Some(SessionEvent::Disconnected { reason }) => {
                    disconnected = Some(reason);
                    break;
                }
                Some(SessionEvent::StateChanged { from, to }) => {
                    tracing::debug!(%from, %to, "session state changed");
                }
                None => break,
            },
            line = lines.recv(), if stdin_open => match line {
                Some(line) => handle_input_line(&controller, &line),
                None => stdin_open = false,
            },
        }
    }

    tokio::task::spawn_blocking(move || controller.stop()).await?;

    match disconnected {
        Some(reason) => Err(SessionError::TransportClosedUnexpectedly { reason }.into()),
        None => Ok(()),
    }
}

/// Send a typed line as a command, or play a cue for `/cue <name>`.
fn handle_input_line(controller: &SessionController, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let result = match parse_cue_line(line) {
        Some(Ok(cue)) => controller.play_cue(cue),
        Some(Err(e)) => {
            eprintln!("{} {}", "Error:".red(), e);
            return;
        }
        None => controller.send_command(line),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red(), e);
    }
}

/// Forward stdin lines from a detached thread.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("voxlink-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// List available audio devices.
fn list_audio_devices() -> Result<()> {
    voxlink::sys::suppress_audio_warnings();

    let inputs = list_input_devices()?;
    let outputs = list_output_devices()?;

    if inputs.is_empty() && outputs.is_empty() {
        eprintln!("No audio devices found");
        std::process::exit(1);
    }

    println!("Input devices:");
    for (idx, device) in inputs.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }
    println!("Output devices:");
    for (idx, device) in outputs.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Path => {
            let path: Option<PathBuf> = custom_path
                .map(Path::to_path_buf)
                .or_else(Config::default_path);
            match path {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("No configuration directory on this platform");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
