//! Session controller: the single owner of a voice session's transport and devices.
//!
//! `start` acquires the microphone and output device, opens the transport
//! and hands everything to a worker thread that pumps audio both ways.
//! `stop` (or a transport closure) runs the teardown in a fixed order:
//! microphone, playback, transport, output device.

pub mod protocol;
pub mod state;
pub(crate) mod worker;

pub use protocol::{ControlMessage, InboundMessage, LogPayload, command_json};
pub use state::{InvalidTransition, SessionEvent, SessionState, StateCell};
pub use worker::TextCallback;

use crate::audio::cue::Cue;
use crate::audio::devices::AudioDevices;
use crate::audio::frame::AudioFrame;
use crate::config::Config;
use crate::defaults;
use crate::error::{SessionError, VoxlinkError};
use crate::pipeline::capture::{CaptureConfig, CapturePipeline};
use crate::pipeline::playback::PlaybackPipeline;
use crate::sys;
use crate::transport::{Connector, OutboundSender};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use worker::{Control, SessionWorker, TextHandler, WorkerChannels};

/// Render completions in flight between the output device and the worker.
const COMPLETION_BUFFER: usize = 16;

/// Session tuning, usually derived from [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub capture: CaptureConfig,
    pub inbound_sample_rate: u32,
    pub block_buffer: usize,
    pub event_buffer: usize,
    /// Play the start ping when a session goes live.
    pub start_cue: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            inbound_sample_rate: defaults::INBOUND_SAMPLE_RATE,
            block_buffer: defaults::BLOCK_BUFFER,
            event_buffer: defaults::EVENT_BUFFER,
            start_cue: false,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            capture: CaptureConfig {
                gain: config.audio.gain,
                gate_threshold: config.audio.gate_threshold,
                flush_threshold: config.audio.flush_threshold,
                target_rate: config.transport.outbound_sample_rate,
                level_log_interval: config.audio.level_log_interval,
            },
            inbound_sample_rate: config.transport.inbound_sample_rate,
            block_buffer: config.session.block_buffer,
            event_buffer: config.session.event_buffer,
            start_cue: config.session.start_cue,
        }
    }
}

struct WorkerHandle {
    control: Sender<Control>,
    outbound: OutboundSender,
    thread: JoinHandle<()>,
}

/// Owns one voice session at a time.
///
/// All lifecycle methods take `&mut self`, so start and stop never race.
/// Dropping the controller stops any live session.
pub struct SessionController {
    config: SessionConfig,
    devices: Arc<dyn AudioDevices>,
    connector: Arc<dyn Connector>,
    state: StateCell,
    events: Receiver<SessionEvent>,
    text_handler: TextHandler,
    worker: Option<WorkerHandle>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        devices: Arc<dyn AudioDevices>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (events_tx, events) = bounded(config.event_buffer.max(1));
        Self {
            config,
            devices,
            connector,
            state: StateCell::new(events_tx),
            events,
            text_handler: Arc::new(RwLock::new(None)),
            worker: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Stream of state changes and disconnect reports.
    ///
    /// Events are dropped when nobody drains the channel.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events.clone()
    }

    /// Register the callback for inbound text log lines, replacing any previous one.
    ///
    /// The callback runs on the session thread; a panic inside it is logged
    /// and does not end the session.
    pub fn on_text_received<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self
            .text_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Start a session against `url`.
    ///
    /// Fails with `AlreadyLive` while a session is connecting or live. A
    /// stopped session is reset to idle first.
    pub fn start(&mut self, url: &str) -> Result<(), SessionError> {
        self.reap_finished_worker();

        match self.state.get() {
            SessionState::Idle => {}
            SessionState::Stopped => {
                self.transition(SessionState::Idle);
            }
            state => return Err(SessionError::AlreadyLive { state }),
        }

        let mut microphone = self.devices.microphone().map_err(device_error)?;
        let mut output = self.devices.output().map_err(device_error)?;

        if let Err(e) = self.state.transition(SessionState::Connecting) {
            return Err(SessionError::AlreadyLive { state: e.from });
        }
        tracing::info!(%url, "connecting");

        let (transport_tx, transport_rx) = bounded(self.config.event_buffer.max(1));
        let mut transport = match self.connector.connect(url, transport_tx) {
            Ok(transport) => transport,
            Err(e) => {
                self.transition(SessionState::Idle);
                return Err(SessionError::TransportOpen {
                    url: url.to_string(),
                    message: transport_error_message(e),
                });
            }
        };

        let (completion_tx, completion_rx) = bounded(COMPLETION_BUFFER);
        let renderer = match output.open(completion_tx) {
            Ok(renderer) => renderer,
            Err(e) => {
                transport.close();
                self.transition(SessionState::Idle);
                return Err(device_error(e));
            }
        };

        let (block_tx, block_rx) = bounded(self.config.block_buffer.max(1));
        if let Err(e) = microphone.start(block_tx) {
            output.close();
            transport.close();
            self.transition(SessionState::Idle);
            return Err(device_error(e));
        }

        let outbound = transport.sender();
        let frame_sender = outbound.clone();
        let capture = CapturePipeline::new(
            self.config.capture.clone(),
            microphone.sample_rate(),
            move |frame: AudioFrame| {
                if let Err(e) = frame_sender.send_binary(frame.to_le_bytes()) {
                    tracing::debug!(samples = frame.len(), "outbound frame dropped: {}", e);
                }
            },
        );
        let playback = PlaybackPipeline::new(renderer, self.config.inbound_sample_rate);

        tracing::info!(
            device_rate = microphone.sample_rate(),
            outbound_rate = self.config.capture.target_rate,
            inbound_rate = self.config.inbound_sample_rate,
            "session live"
        );
        self.transition(SessionState::Live);

        let (control_tx, control_rx) = bounded(8);
        let worker = SessionWorker {
            microphone,
            output,
            transport,
            capture,
            playback,
            state: self.state.clone(),
            text_handler: Arc::clone(&self.text_handler),
            cue_rate: self.config.inbound_sample_rate,
        };
        let channels = WorkerChannels {
            control: control_rx,
            blocks: block_rx,
            transport: transport_rx,
            completions: completion_rx,
        };

        let thread = std::thread::Builder::new()
            .name("voxlink-session".to_string())
            .spawn(move || worker.run(channels))
            // The unstarted worker was dropped with the closure, releasing its handles.
            .map_err(|e| self.abandon_start(e.to_string()))?;

        self.worker = Some(WorkerHandle {
            control: control_tx,
            outbound,
            thread,
        });

        // The remote may already have hung up; that surfaces as a Disconnected event.
        if self.config.start_cue
            && let Err(e) = self.play_cue(Cue::StartPing)
        {
            tracing::warn!("start cue not played: {}", e);
        }
        Ok(())
    }

    /// Unwind a start that failed after going live, ending Idle.
    fn abandon_start(&self, message: String) -> SessionError {
        tracing::error!("session thread not started: {}", message);
        self.transition(SessionState::Stopping);
        self.transition(SessionState::Stopped);
        self.transition(SessionState::Idle);
        SessionError::SessionThread { message }
    }

    /// Stop the session and wait for teardown to finish.
    ///
    /// A no-op when idle or already stopped.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        tracing::info!("stopping session");
        if worker.control.send(Control::Stop).is_err() {
            tracing::debug!("session worker already exited");
        }
        if let Err(panic_info) = worker.thread.join() {
            tracing::error!(
                "session thread panicked: {}",
                sys::panic_message(&*panic_info)
            );
        }
    }

    /// Send a text command (`{"command": ...}`) to the endpoint.
    pub fn send_command(&self, text: &str) -> Result<(), SessionError> {
        let worker = self.live_worker()?;
        worker
            .outbound
            .send_text(command_json(text))
            .map_err(|_| SessionError::NotLive)
    }

    /// Queue a cue tone behind any audio already playing.
    pub fn play_cue(&self, cue: Cue) -> Result<(), SessionError> {
        let worker = self.live_worker()?;
        worker
            .control
            .send(Control::PlayCue(cue))
            .map_err(|_| SessionError::NotLive)
    }

    fn live_worker(&self) -> Result<&WorkerHandle, SessionError> {
        match &self.worker {
            Some(worker) if self.state.get() == SessionState::Live => Ok(worker),
            _ => Err(SessionError::NotLive),
        }
    }

    /// Join a worker that tore itself down after a transport closure.
    fn reap_finished_worker(&mut self) {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.thread.is_finished())
        {
            self.stop();
        }
    }

    fn transition(&self, to: SessionState) {
        if let Err(e) = self.state.transition(to) {
            tracing::warn!("{}", e);
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn device_error(error: VoxlinkError) -> SessionError {
    SessionError::DeviceAccess {
        message: error.to_string(),
    }
}

fn transport_error_message(error: VoxlinkError) -> String {
    match error {
        VoxlinkError::TransportConnect { message, .. } => message,
        other => other.to_string(),
    }
}
