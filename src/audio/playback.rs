//! Speaker output using CPAL.
//!
//! The output stream runs for the whole session. Submitted units are
//! resampled to the device rate and played from a shared slot; the audio
//! callback reports each finished unit on the completion channel and plays
//! silence while the slot is empty.

use crate::audio::capture::SendableStream;
use crate::audio::devices::{Direction, find_device};
use crate::audio::pcm;
use crate::audio::sink::{AudioOutput, RenderId, RenderUnit, Renderer};
use crate::error::{Result, VoxlinkError};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct ActiveRender {
    id: RenderId,
    samples: Vec<f32>,
    position: usize,
}

struct RenderSlot {
    active: Option<ActiveRender>,
    completions: Sender<RenderId>,
}

impl RenderSlot {
    /// Next mono sample, reporting completion when the active unit runs out.
    fn next_sample(&mut self) -> f32 {
        let Some(active) = self.active.as_mut() else {
            return 0.0;
        };
        let sample = active.samples.get(active.position).copied().unwrap_or(0.0);
        active.position += 1;

        if active.position >= active.samples.len() {
            let id = active.id;
            self.active = None;
            // The worker drains completions promptly; a full channel means it is gone.
            let _ = self.completions.try_send(id);
        }
        sample
    }
}

fn lock_slot(slot: &Mutex<RenderSlot>) -> MutexGuard<'_, RenderSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Output device opened per session.
pub struct CpalSpeaker {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    stream: Option<SendableStream>,
}

impl CpalSpeaker {
    /// Select `device_name`, or the preferred default output device.
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let device = find_device(device_name, Direction::Output)?;
        let config = device
            .default_output_config()
            .map_err(|e| VoxlinkError::AudioPlayback {
                message: format!("Failed to query default output config: {}", e),
            })?;

        tracing::info!(
            device = device.name().unwrap_or_default(),
            rate = config.sample_rate().0,
            channels = config.channels(),
            format = ?config.sample_format(),
            "speaker selected"
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    fn build_stream<T>(&self, slot: Arc<Mutex<RenderSlot>>) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(self.config.channels()).max(1);

        self.device
            .build_output_stream(
                &self.config.config(),
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut slot = lock_slot(&slot);
                    for frame in data.chunks_mut(channels) {
                        let value = T::from_sample(slot.next_sample());
                        frame.fill(value);
                    }
                },
                |err| tracing::warn!("audio output stream error: {}", err),
                None,
            )
            .map_err(|e| VoxlinkError::AudioPlayback {
                message: format!("Failed to build output stream: {}", e),
            })
    }
}

impl AudioOutput for CpalSpeaker {
    fn open(&mut self, completions: Sender<RenderId>) -> Result<Box<dyn Renderer>> {
        self.close();

        let slot = Arc::new(Mutex::new(RenderSlot {
            active: None,
            completions,
        }));

        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(Arc::clone(&slot))?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(Arc::clone(&slot))?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(Arc::clone(&slot))?,
            cpal::SampleFormat::I32 => self.build_stream::<i32>(Arc::clone(&slot))?,
            format => {
                return Err(VoxlinkError::AudioFormatMismatch {
                    expected: "f32, i16, u16 or i32 samples".to_string(),
                    actual: format!("{:?}", format),
                });
            }
        };

        stream.play().map_err(|e| VoxlinkError::AudioPlayback {
            message: format!("Failed to start output stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));

        Ok(Box::new(SpeakerRenderer {
            slot,
            device_rate: self.config.sample_rate().0,
        }))
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take()
            && let Err(e) = stream.0.pause()
        {
            tracing::debug!("failed to pause output stream: {}", e);
        }
    }
}

struct SpeakerRenderer {
    slot: Arc<Mutex<RenderSlot>>,
    device_rate: u32,
}

impl Renderer for SpeakerRenderer {
    fn render(&mut self, unit: RenderUnit) -> Result<()> {
        let samples = pcm::resample_linear(&unit.samples, unit.sample_rate, self.device_rate);
        if samples.is_empty() {
            return Err(VoxlinkError::AudioPlayback {
                message: format!("render {} has no samples", unit.id),
            });
        }

        lock_slot(&self.slot).active = Some(ActiveRender {
            id: unit.id,
            samples,
            position: 0,
        });
        Ok(())
    }

    fn halt(&mut self) {
        lock_slot(&self.slot).active = None;
    }
}
