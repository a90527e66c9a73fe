//! Sample conversions shared by the capture and playback paths.
//!
//! Float samples are normalized to [-1.0, 1.0]. The 16-bit mapping is
//! asymmetric so both extremes stay representable: negative values scale by
//! 32768, non-negative values by 32767.

/// Apply `gain` and hard-clip to [-1.0, 1.0].
pub fn gain_and_clip(sample: f32, gain: f32) -> f32 {
    (sample * gain).clamp(-1.0, 1.0)
}

/// Largest absolute amplitude in the block. NaN samples are ignored.
pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, &s| peak.max(s.abs()))
}

/// Encode a normalized float sample as signed 16-bit PCM.
///
/// Out-of-range input is clipped first; the fractional part is truncated.
pub fn f32_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Decode a signed 16-bit PCM sample to a normalized float.
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

/// Serialize samples as little-endian bytes, two per sample.
pub fn encode_le(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parse little-endian 16-bit samples. A trailing odd byte is ignored.
pub fn decode_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Nearest-sample decimation from `from_rate` to `to_rate`.
///
/// Output length is `floor(len / ratio)`; output sample `i` is the input
/// sample at `floor(i * ratio)`. No filtering is applied.
pub fn decimate(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let idx = (i as f64 * ratio).floor() as usize;
            samples[idx.min(last)]
        })
        .collect()
}

/// Linear-interpolation resampling, used to adapt playback audio to the
/// output device's native rate.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx.min(samples.len() - 1)]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}
