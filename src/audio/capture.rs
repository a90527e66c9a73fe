//! Microphone capture using CPAL (Cross-Platform Audio Library).

use crate::audio::devices::{Direction, find_device};
use crate::audio::source::MicrophoneSource;
use crate::error::{Result, VoxlinkError};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is created, paused and dropped by whichever thread
/// owns the microphone; it is never shared.
pub(crate) struct SendableStream(pub(crate) cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture at the device's native format.
///
/// Multi-channel input is averaged to mono and delivered in blocks of
/// `block_size` samples. If the session falls behind, whole blocks are
/// dropped rather than blocking the audio callback.
pub struct CpalMicrophone {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    block_size: usize,
    stream: Option<SendableStream>,
    dropped_blocks: Arc<AtomicU64>,
}

impl CpalMicrophone {
    /// Open `device_name`, or the preferred default input device.
    pub fn new(device_name: Option<&str>, block_size: usize) -> Result<Self> {
        let device = find_device(device_name, Direction::Input)?;
        let config = device
            .default_input_config()
            .map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to query default input config: {}", e),
            })?;

        tracing::info!(
            device = device.name().unwrap_or_default(),
            rate = config.sample_rate().0,
            channels = config.channels(),
            format = ?config.sample_format(),
            "microphone selected"
        );

        Ok(Self {
            device,
            config,
            block_size: block_size.max(1),
            stream: None,
            dropped_blocks: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Blocks discarded because the session was not keeping up.
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    fn build_stream<T>(&self, blocks: Sender<Vec<f32>>) -> Result<cpal::Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = usize::from(self.config.channels()).max(1);
        let writer = Arc::new(BlockWriter::new(
            blocks,
            self.block_size,
            Arc::clone(&self.dropped_blocks),
        ));
        let on_error = Arc::clone(&writer);

        self.device
            .build_input_stream(
                &self.config.config(),
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    writer.push_interleaved(data, channels);
                },
                move |err| on_error.stream_error(&err),
                None,
            )
            .map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to build input stream: {}", e),
            })
    }
}

struct BlockWriterState {
    blocks: Option<Sender<Vec<f32>>>,
    pending: Vec<f32>,
}

/// Shared between the data and error callbacks of one input stream.
///
/// Losing the device drops the sender, which the session sees as end of input.
struct BlockWriter {
    block_size: usize,
    dropped: Arc<AtomicU64>,
    state: Mutex<BlockWriterState>,
}

impl BlockWriter {
    fn new(blocks: Sender<Vec<f32>>, block_size: usize, dropped: Arc<AtomicU64>) -> Self {
        Self {
            block_size,
            dropped,
            state: Mutex::new(BlockWriterState {
                blocks: Some(blocks),
                pending: Vec::with_capacity(block_size * 2),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BlockWriterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Downmix interleaved frames and send every complete block.
    fn push_interleaved<T>(&self, data: &[T], channels: usize)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let mut state = self.lock();
        let BlockWriterState { blocks, pending } = &mut *state;
        let Some(tx) = blocks.as_ref() else {
            return;
        };

        pending.extend(data.chunks(channels).map(|frame| {
            frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>() / frame.len() as f32
        }));

        while pending.len() >= self.block_size {
            let block: Vec<f32> = pending.drain(..self.block_size).collect();
            match tx.try_send(block) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                // Session is gone; stop() will pause the stream.
                Err(TrySendError::Disconnected(_)) => {
                    pending.clear();
                    *blocks = None;
                    return;
                }
            }
        }
    }

    fn stream_error(&self, err: &cpal::StreamError) {
        match err {
            cpal::StreamError::DeviceNotAvailable => {
                tracing::warn!("audio input device disappeared, ending input");
                let mut state = self.lock();
                state.blocks = None;
                state.pending.clear();
            }
            err => tracing::warn!("audio input stream error: {}", err),
        }
    }

    fn is_open(&self) -> bool {
        self.lock().blocks.is_some()
    }
}

impl MicrophoneSource for CpalMicrophone {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    fn start(&mut self, blocks: Sender<Vec<f32>>) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(blocks)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(blocks)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(blocks)?,
            cpal::SampleFormat::I32 => self.build_stream::<i32>(blocks)?,
            format => {
                return Err(VoxlinkError::AudioFormatMismatch {
                    expected: "f32, i16, u16 or i32 samples".to_string(),
                    actual: format!("{:?}", format),
                });
            }
        };

        stream.play().map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };

        let dropped = self.dropped_blocks();
        if dropped > 0 {
            tracing::warn!(dropped, "microphone blocks dropped while the session was busy");
        }

        stream.0.pause().map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to stop audio stream: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, bounded};

    #[test]
    fn test_create_with_invalid_device_name() {
        match CpalMicrophone::new(Some("NonExistentDevice12345"), 4096) {
            Err(VoxlinkError::AudioDeviceNotFound { device }) => {
                assert_eq!(device, "NonExistentDevice12345");
            }
            Err(VoxlinkError::AudioCapture { .. }) => {}
            Err(e) => panic!("Expected AudioDeviceNotFound error, got {}", e),
            Ok(_) => panic!("Expected AudioDeviceNotFound error"),
        }
    }

    fn writer(block_size: usize, capacity: usize) -> (BlockWriter, Receiver<Vec<f32>>) {
        let (tx, rx) = bounded(capacity);
        let writer = BlockWriter::new(tx, block_size, Arc::new(AtomicU64::new(0)));
        (writer, rx)
    }

    #[test]
    fn test_writer_downmixes_into_fixed_blocks() {
        let (writer, rx) = writer(4, 8);

        // Ten stereo frames: left 0.5, right -0.1.
        let data: Vec<f32> = (0..10).flat_map(|_| [0.5, -0.1]).collect();
        writer.push_interleaved(&data, 2);

        let blocks: Vec<Vec<f32>> = rx.try_iter().collect();
        assert_eq!(blocks.len(), 2);
        for sample in blocks.concat() {
            assert!((sample - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_writer_counts_dropped_blocks_when_full() {
        let (writer, rx) = writer(2, 1);

        writer.push_interleaved(&[0.1f32; 6], 1);

        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(writer.dropped.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_device_loss_ends_input() {
        let (writer, rx) = writer(4, 8);
        writer.push_interleaved(&[0.3f32; 2], 1);

        writer.stream_error(&cpal::StreamError::DeviceNotAvailable);

        assert!(!writer.is_open());
        assert!(rx.recv().is_err());
        writer.push_interleaved(&[0.3f32; 8], 1);
    }

    #[test]
    fn test_backend_error_keeps_input_open() {
        let (writer, _rx) = writer(4, 8);

        writer.stream_error(&cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "xrun".to_string(),
            },
        });

        assert!(writer.is_open());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_capture_delivers_blocks() {
        let mut mic = CpalMicrophone::new(None, 1024).expect("Failed to open microphone");
        let (tx, rx) = bounded(16);

        mic.start(tx).expect("Failed to start capture");
        let block = rx
            .recv_timeout(std::time::Duration::from_secs(2))
            .expect("no block delivered");
        assert_eq!(block.len(), 1024);

        mic.stop().expect("Failed to stop capture");
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_start_stop_multiple_times() {
        let mut mic = CpalMicrophone::new(None, 4096).expect("Failed to open microphone");

        for _ in 0..3 {
            let (tx, _rx) = bounded(4);
            assert!(mic.start(tx).is_ok());
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(mic.stop().is_ok());
        }
    }
}
