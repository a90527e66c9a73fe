//! Microphone capability and its test double.

use crate::call_log::{self, CallLog};
use crate::error::{Result, VoxlinkError};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A microphone that delivers fixed-size blocks of mono float samples.
///
/// Blocks are sent on the channel handed to [`start`](Self::start) from
/// whatever thread the device runs on. Dropping the sender (end of input)
/// tells the session no more blocks will arrive.
pub trait MicrophoneSource: Send {
    /// Native sample rate of the delivered blocks.
    fn sample_rate(&self) -> u32;

    /// Begin delivering blocks.
    fn start(&mut self, blocks: Sender<Vec<f32>>) -> Result<()>;

    /// Stop delivering blocks and release the device stream.
    fn stop(&mut self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MockMicrophoneState {
    blocks: Option<Sender<Vec<f32>>>,
    start_count: usize,
    stop_count: usize,
}

/// Scripted microphone for tests.
///
/// Clones share state, so a test keeps one handle to feed blocks while the
/// session owns another.
#[derive(Debug, Clone)]
pub struct MockMicrophone {
    sample_rate: u32,
    should_fail_start: bool,
    error_message: String,
    call_log: Option<CallLog>,
    state: Arc<Mutex<MockMicrophoneState>>,
}

impl MockMicrophone {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            should_fail_start: false,
            error_message: "mock microphone error".to_string(),
            call_log: None,
            state: Arc::new(Mutex::new(MockMicrophoneState::default())),
        }
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Record `mic.stop` in `log` on every stop
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockMicrophoneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver one block as the device callback would.
    ///
    /// Returns false when the microphone is not started or the receiver is gone.
    pub fn feed(&self, block: Vec<f32>) -> bool {
        let sender = self.lock().blocks.clone();
        match sender {
            Some(tx) => tx.send(block).is_ok(),
            None => false,
        }
    }

    /// Simulate end of input: the block channel is closed.
    pub fn finish(&self) {
        self.lock().blocks = None;
    }

    pub fn is_started(&self) -> bool {
        self.lock().blocks.is_some()
    }

    pub fn start_count(&self) -> usize {
        self.lock().start_count
    }

    pub fn stop_count(&self) -> usize {
        self.lock().stop_count
    }
}

impl MicrophoneSource for MockMicrophone {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, blocks: Sender<Vec<f32>>) -> Result<()> {
        if self.should_fail_start {
            return Err(VoxlinkError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        let mut state = self.lock();
        state.blocks = Some(blocks);
        state.start_count += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        call_log::record(self.call_log.as_ref(), "mic.stop");
        let mut state = self.lock();
        state.blocks = None;
        state.stop_count += 1;
        Ok(())
    }
}
