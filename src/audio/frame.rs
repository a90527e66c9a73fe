//! Fixed-format PCM buffer exchanged with the transport.

use crate::audio::pcm;

/// An immutable block of mono signed 16-bit samples at one sample rate.
///
/// Frames carry no sequence number: their order is the order the transport
/// delivers them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Parse a raw little-endian 16-bit payload. A trailing odd byte is dropped.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Self {
        Self::new(pcm::decode_le(bytes), sample_rate)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame length in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Headerless little-endian wire encoding.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        pcm::encode_le(&self.samples)
    }

    /// Normalized float samples for rendering.
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples.iter().map(|&s| pcm::i16_to_f32(s)).collect()
    }
}
