//! WAV file microphone.
//!
//! Streams a recorded file through the capture path in device-sized blocks,
//! at the file's own sample rate. Blocks are paced at real time by default
//! so the endpoint sees the same cadence a live microphone would produce.

use crate::audio::pcm;
use crate::audio::source::MicrophoneSource;
use crate::error::{Result, VoxlinkError};
use crate::sys;
use crossbeam_channel::Sender;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Microphone backed by a WAV file, downmixed to mono float samples.
pub struct WavMicrophone {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    block_size: usize,
    realtime: bool,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WavMicrophone {
    /// Open a WAV file on disk.
    pub fn open(path: &Path, block_size: usize) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to open WAV file {}: {}", path.display(), e),
        })?;
        Self::from_reader(std::io::BufReader::new(file), block_size)
    }

    /// Create from any reader.
    pub fn from_reader<R: Read>(reader: R, block_size: usize) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| VoxlinkError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => wav_reader
                .samples::<i16>()
                .map(|s| s.map(pcm::i16_to_f32))
                .collect::<std::result::Result<_, _>>(),
            (hound::SampleFormat::Float, 32) => wav_reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>(),
            (format, bits) => {
                return Err(VoxlinkError::AudioFormatMismatch {
                    expected: "16-bit int or 32-bit float".to_string(),
                    actual: format!("{}-bit {:?}", bits, format),
                });
            }
        }
        .map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

        let channels = usize::from(spec.channels).max(1);
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        tracing::debug!(
            rate = spec.sample_rate,
            channels = spec.channels,
            samples = samples.len(),
            "WAV input loaded"
        );

        Ok(Self {
            samples: Arc::new(samples),
            sample_rate: spec.sample_rate,
            block_size: block_size.max(1),
            realtime: true,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
        })
    }

    /// Deliver blocks as fast as the receiver accepts them.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Mono samples at the file's rate.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

impl MicrophoneSource for WavMicrophone {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, blocks: Sender<Vec<f32>>) -> Result<()> {
        if self.thread.is_some() {
            return Ok(());
        }

        self.stop_flag.store(false, Ordering::SeqCst);
        let samples = Arc::clone(&self.samples);
        let stop = Arc::clone(&self.stop_flag);
        let block_size = self.block_size;
        let block_period = if self.realtime && self.sample_rate > 0 {
            Some(Duration::from_secs_f64(
                block_size as f64 / self.sample_rate as f64,
            ))
        } else {
            None
        };

        let handle = std::thread::Builder::new()
            .name("voxlink-wav".to_string())
            .spawn(move || {
                let started = Instant::now();
                for (index, block) in samples.chunks(block_size).enumerate() {
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Some(period) = block_period {
                        let due = started + period * index as u32;
                        if let Some(wait) = due.checked_duration_since(Instant::now()) {
                            std::thread::sleep(wait);
                        }
                    }
                    if blocks.send(block.to_vec()).is_err() {
                        return;
                    }
                }
                tracing::info!("WAV input finished");
                // Dropping `blocks` here signals end of input.
            })?;

        self.thread = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            // A send blocked on a full channel wakes once the receiver is dropped.
            sys::join_with_deadline(handle, Duration::from_secs(1), "voxlink-wav");
        }
        Ok(())
    }
}

impl Drop for WavMicrophone {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::io::Cursor;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn from_reader_mono_keeps_rate_and_scale() {
        let wav = make_wav_data(48000, 1, &[0, 16384, -32768, 32767]);
        let mic = WavMicrophone::from_reader(Cursor::new(wav), 4096).unwrap();

        assert_eq!(mic.sample_rate(), 48000);
        assert_eq!(mic.samples(), &[0.0, 16384.0 / 32767.0, -1.0, 1.0]);
    }

    #[test]
    fn from_reader_stereo_downmixes_to_mono() {
        let wav = make_wav_data(16000, 2, &[16384, 0, -16384, -16384]);
        let mic = WavMicrophone::from_reader(Cursor::new(wav), 4096).unwrap();

        assert_eq!(mic.samples().len(), 2);
        assert!((mic.samples()[0] - 0.25).abs() < 1e-3);
        assert!((mic.samples()[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn from_reader_rejects_unsupported_format() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        writer.write_sample(1i8).unwrap();
        writer.finalize().unwrap();

        match WavMicrophone::from_reader(Cursor::new(cursor.into_inner()), 4096) {
            Err(VoxlinkError::AudioFormatMismatch { actual, .. }) => {
                assert!(actual.starts_with("8-bit"));
            }
            _ => panic!("Expected AudioFormatMismatch error"),
        }
    }

    #[test]
    fn from_reader_rejects_garbage() {
        assert!(matches!(
            WavMicrophone::from_reader(Cursor::new(b"not a wav".to_vec()), 4096),
            Err(VoxlinkError::AudioCapture { .. })
        ));
    }

    #[test]
    fn streams_blocks_then_ends_input() {
        let wav = make_wav_data(16000, 1, &vec![1000i16; 2500]);
        let mut mic = WavMicrophone::from_reader(Cursor::new(wav), 1000)
            .unwrap()
            .with_realtime(false);
        let (tx, rx) = unbounded();

        mic.start(tx).unwrap();
        let lengths: Vec<usize> = rx.iter().map(|block| block.len()).collect();

        assert_eq!(lengths, vec![1000, 1000, 500]);
        mic.stop().unwrap();
    }

    #[test]
    fn duration_matches_sample_count() {
        let wav = make_wav_data(16000, 1, &vec![0i16; 8000]);
        let mic = WavMicrophone::from_reader(Cursor::new(wav), 4096).unwrap();
        assert_eq!(mic.duration(), Duration::from_millis(500));
    }
}
