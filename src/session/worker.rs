//! Session worker thread.
//!
//! The worker owns every live resource of a session (microphone, output
//! device, transport, both pipelines) and multiplexes the four inputs that
//! drive them: control requests, microphone blocks, transport events and
//! render completions. It exits after running the teardown sequence, either
//! on request or because the transport closed.

use crate::audio::cue::Cue;
use crate::audio::sink::{AudioOutput, RenderId};
use crate::audio::source::MicrophoneSource;
use crate::pipeline::capture::CapturePipeline;
use crate::pipeline::playback::PlaybackPipeline;
use crate::session::protocol::ControlMessage;
use crate::session::state::{SessionEvent, SessionState, StateCell};
use crate::sys;
use crate::transport::{Transport, TransportEvent};
use crossbeam_channel::{Receiver, select};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// Callback receiving inbound text log lines.
pub type TextCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Slot for the text callback, replaceable while a session runs.
pub(crate) type TextHandler = Arc<RwLock<Option<TextCallback>>>;

/// Requests from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Stop,
    PlayCue(Cue),
}

pub(crate) struct WorkerChannels {
    pub control: Receiver<Control>,
    pub blocks: Receiver<Vec<f32>>,
    pub transport: Receiver<TransportEvent>,
    pub completions: Receiver<RenderId>,
}

pub(crate) struct SessionWorker {
    pub microphone: Box<dyn MicrophoneSource>,
    pub output: Box<dyn AudioOutput>,
    pub transport: Box<dyn Transport>,
    pub capture: CapturePipeline,
    pub playback: PlaybackPipeline,
    pub state: StateCell,
    pub text_handler: TextHandler,
    /// Rate cue tones are synthesized at.
    pub cue_rate: u32,
}

impl SessionWorker {
    pub fn run(mut self, channels: WorkerChannels) {
        let WorkerChannels {
            control,
            blocks,
            transport,
            completions,
        } = channels;
        let no_blocks = crossbeam_channel::never::<Vec<f32>>();
        let mut input_open = true;

        let disconnect_reason: Option<String> = loop {
            let block_rx = if input_open { &blocks } else { &no_blocks };

            select! {
                recv(control) -> request => match request {
                    Ok(Control::PlayCue(cue)) => self.play_cue(cue),
                    Ok(Control::Stop) | Err(_) => break None,
                },
                recv(block_rx) -> block => match block {
                    Ok(block) => {
                        self.capture.process_block(&block);
                    }
                    Err(_) => {
                        tracing::info!("microphone input ended");
                        self.capture.flush();
                        input_open = false;
                    }
                },
                recv(transport) -> event => match event {
                    Ok(TransportEvent::Closed { reason }) => break Some(reason),
                    Ok(event) => self.route(event),
                    Err(_) => break Some("transport event channel closed".to_string()),
                },
                recv(completions) -> id => {
                    if let Ok(id) = id {
                        self.playback.on_render_complete(id);
                    }
                }
            }
        };

        self.teardown(disconnect_reason);
    }

    fn route(&mut self, event: TransportEvent) {
        match ControlMessage::from_event(event) {
            Some(ControlMessage::AudioChunk(payload)) => {
                self.playback.enqueue_pcm(&payload);
            }
            Some(ControlMessage::TextLog(message)) => self.deliver_text(&message),
            None => {}
        }
    }

    fn deliver_text(&self, message: &str) {
        let handler = self
            .text_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(callback) = handler.as_ref() else {
            tracing::debug!("no text callback registered, dropping log line");
            return;
        };
        if let Err(panic_info) = panic::catch_unwind(AssertUnwindSafe(|| callback(message))) {
            tracing::error!(
                "text callback panicked: {}",
                sys::panic_message(&*panic_info)
            );
        }
    }

    fn play_cue(&mut self, cue: Cue) {
        tracing::debug!(%cue, "playing cue");
        self.playback.enqueue_samples(cue.render(self.cue_rate), self.cue_rate);
    }

    /// Release everything in order: microphone, playback, transport, output.
    fn teardown(mut self, disconnect_reason: Option<String>) {
        if self.state.get().is_active()
            && let Err(e) = self.state.transition(SessionState::Stopping)
        {
            tracing::warn!("{}", e);
        }

        if let Err(e) = self.microphone.stop() {
            tracing::warn!("failed to stop microphone: {}", e);
        }
        self.capture.discard();

        self.playback.preempt();
        self.transport.close();
        self.output.close();

        if let Err(e) = self.state.transition(SessionState::Stopped) {
            tracing::warn!("{}", e);
        }

        match disconnect_reason {
            Some(reason) => {
                tracing::info!(%reason, "session ended by remote");
                self.state.publish(SessionEvent::Disconnected { reason });
                if let Err(e) = self.state.transition(SessionState::Idle) {
                    tracing::warn!("{}", e);
                }
            }
            None => tracing::info!("session stopped"),
        }
    }
}
