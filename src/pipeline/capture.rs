//! Capture pipeline: raw microphone blocks in, outbound frames out.
//!
//! Each block is gain-shaped and clipped, then tested against an amplitude
//! gate. Loud blocks are decimated to the transport rate and buffered; the
//! buffer is flushed as one frame when it reaches the flush threshold or on
//! the first silent block after speech.

use crate::audio::frame::AudioFrame;
use crate::audio::pcm;
use crate::defaults;

/// Tuning for the capture pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub gain: f32,
    pub gate_threshold: f32,
    /// Buffered samples (at `target_rate`) that trigger a flush.
    pub flush_threshold: usize,
    pub target_rate: u32,
    /// Log the block peak every this many blocks; 0 disables.
    pub level_log_interval: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            gain: defaults::GAIN,
            gate_threshold: defaults::GATE_THRESHOLD,
            flush_threshold: defaults::FLUSH_THRESHOLD,
            target_rate: defaults::OUTBOUND_SAMPLE_RATE,
            level_log_interval: defaults::LEVEL_LOG_INTERVAL,
        }
    }
}

/// Not-yet-sent outbound samples.
#[derive(Debug, Default)]
pub struct CaptureAccumulator {
    samples: Vec<i16>,
}

impl CaptureAccumulator {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn extend<I: IntoIterator<Item = i16>>(&mut self, samples: I) {
        self.samples.extend(samples);
    }

    /// Move everything buffered into one frame, leaving the accumulator empty.
    pub fn take(&mut self, sample_rate: u32) -> Option<AudioFrame> {
        if self.samples.is_empty() {
            return None;
        }
        Some(AudioFrame::new(std::mem::take(&mut self.samples), sample_rate))
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// What happened to one processed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Empty block; nothing changed.
    Skipped,
    /// Below the gate. `flushed` is true if buffered speech was sent.
    Silence { flushed: bool },
    /// Above the gate and buffered. `flushed` is true if the flush threshold was hit.
    Buffered { flushed: bool },
}

/// Callback receiving each flushed frame.
pub type FrameSender = Box<dyn FnMut(AudioFrame) + Send>;

/// Converts device blocks into outbound frames.
///
/// The pipeline never touches the transport; flushed frames go to the
/// send callback supplied at construction.
pub struct CapturePipeline {
    config: CaptureConfig,
    device_rate: u32,
    accumulator: CaptureAccumulator,
    scratch: Vec<f32>,
    send: FrameSender,
    blocks_processed: u64,
    frames_flushed: u64,
}

impl CapturePipeline {
    pub fn new<F>(config: CaptureConfig, device_rate: u32, send: F) -> Self
    where
        F: FnMut(AudioFrame) + Send + 'static,
    {
        Self {
            config,
            device_rate,
            accumulator: CaptureAccumulator::default(),
            scratch: Vec::new(),
            send: Box::new(send),
            blocks_processed: 0,
            frames_flushed: 0,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    /// Samples buffered and not yet sent.
    pub fn buffered(&self) -> usize {
        self.accumulator.len()
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    pub fn frames_flushed(&self) -> u64 {
        self.frames_flushed
    }

    /// Process one block of mono samples at the device rate.
    pub fn process_block(&mut self, block: &[f32]) -> BlockOutcome {
        if block.is_empty() {
            return BlockOutcome::Skipped;
        }
        self.blocks_processed += 1;

        let gain = self.config.gain;
        self.scratch.clear();
        self.scratch
            .extend(block.iter().map(|&s| pcm::gain_and_clip(s, gain)));

        let peak = pcm::peak_amplitude(&self.scratch);
        let interval = self.config.level_log_interval;
        if interval > 0 && self.blocks_processed % interval == 0 {
            tracing::debug!(
                peak = format_args!("{:.4}", peak),
                buffered = self.accumulator.len(),
                "microphone level"
            );
        }

        if peak < self.config.gate_threshold {
            return BlockOutcome::Silence {
                flushed: self.flush(),
            };
        }

        let resampled = pcm::decimate(&self.scratch, self.device_rate, self.config.target_rate);
        self.accumulator
            .extend(resampled.into_iter().map(pcm::f32_to_i16));

        let flushed = self.accumulator.len() >= self.config.flush_threshold && self.flush();
        BlockOutcome::Buffered { flushed }
    }

    /// Send everything buffered as one frame. Returns false if nothing was buffered.
    pub fn flush(&mut self) -> bool {
        match self.accumulator.take(self.config.target_rate) {
            Some(frame) => {
                tracing::trace!(samples = frame.len(), "flushing outbound frame");
                self.frames_flushed += 1;
                (self.send)(frame);
                true
            }
            None => false,
        }
    }

    /// Drop buffered samples without sending them.
    pub fn discard(&mut self) {
        self.accumulator.clear();
    }
}
