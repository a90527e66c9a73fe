//! Synthesized UI cue tones.
//!
//! Cues are short oscillator sweeps with a gain envelope, rendered into a
//! sample buffer and played through the playback pipeline like any other
//! inbound audio.

use crate::defaults;
use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Click,
    Enter,
    Alert,
    StartPing,
}

#[derive(Debug, Clone, Copy)]
enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
}

#[derive(Debug, Clone, Copy)]
enum Ramp {
    Linear,
    Exponential,
}

impl Ramp {
    /// Value at progress `t` in [0, 1]. Exponential ramps need non-zero endpoints.
    fn at(self, start: f32, end: f32, t: f32) -> f32 {
        match self {
            Ramp::Linear => start + (end - start) * t,
            Ramp::Exponential => start * (end / start).powf(t),
        }
    }
}

/// Parameters for one cue.
struct Voice {
    waveform: Waveform,
    freq: (f32, f32),
    freq_ramp: Ramp,
    freq_secs: f32,
    gain: (f32, f32),
    gain_ramp: Ramp,
    secs: f32,
}

impl Cue {
    pub const ALL: [Cue; 4] = [Cue::Click, Cue::Enter, Cue::Alert, Cue::StartPing];

    pub fn name(self) -> &'static str {
        match self {
            Cue::Click => "click",
            Cue::Enter => "enter",
            Cue::Alert => "alert",
            Cue::StartPing => "start_ping",
        }
    }

    fn voice(self) -> Voice {
        match self {
            Cue::Click => Voice {
                waveform: Waveform::Sine,
                freq: (1200.0, 1200.0),
                freq_ramp: Ramp::Linear,
                freq_secs: 0.1,
                gain: (0.1, 0.01),
                gain_ramp: Ramp::Exponential,
                secs: 0.1,
            },
            Cue::Enter => Voice {
                waveform: Waveform::Triangle,
                freq: (200.0, 600.0),
                freq_ramp: Ramp::Linear,
                freq_secs: 0.3,
                gain: (0.1, 0.0),
                gain_ramp: Ramp::Linear,
                secs: 0.4,
            },
            Cue::Alert => Voice {
                waveform: Waveform::Sawtooth,
                freq: (150.0, 150.0),
                freq_ramp: Ramp::Linear,
                freq_secs: 0.3,
                gain: (0.2, 0.01),
                gain_ramp: Ramp::Exponential,
                secs: 0.3,
            },
            Cue::StartPing => Voice {
                waveform: Waveform::Sine,
                freq: (880.0, 440.0),
                freq_ramp: Ramp::Exponential,
                freq_secs: 0.3,
                gain: (0.1, 0.01),
                gain_ramp: Ramp::Exponential,
                secs: 0.3,
            },
        }
    }

    /// Render the cue at `sample_rate`, master gain applied.
    pub fn render(self, sample_rate: u32) -> Vec<f32> {
        let voice = self.voice();
        let rate = sample_rate as f32;
        let len = (voice.secs * rate).round() as usize;
        let mut phase = 0.0f32;

        (0..len)
            .map(|i| {
                let t = i as f32 / rate;
                let freq = voice
                    .freq_ramp
                    .at(voice.freq.0, voice.freq.1, (t / voice.freq_secs).min(1.0));
                let gain = voice
                    .gain_ramp
                    .at(voice.gain.0, voice.gain.1, (t / voice.secs).min(1.0));

                let sample = oscillate(voice.waveform, phase);
                phase = (phase + freq / rate).fract();

                sample * gain * defaults::CUE_MASTER_GAIN
            })
            .collect()
    }
}

/// One oscillator sample at `phase` in [0, 1).
fn oscillate(waveform: Waveform, phase: f32) -> f32 {
    match waveform {
        Waveform::Sine => (2.0 * PI * phase).sin(),
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        Waveform::Sawtooth => 2.0 * phase - 1.0,
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Cue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cue::ALL
            .into_iter()
            .find(|cue| cue.name() == s)
            .ok_or_else(|| {
                format!(
                    "unknown cue '{}' (expected one of: click, enter, alert, start_ping)",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pcm;

    #[test]
    fn test_cue_lengths() {
        assert_eq!(Cue::Click.render(24000).len(), 2400);
        assert_eq!(Cue::Enter.render(24000).len(), 9600);
        assert_eq!(Cue::Alert.render(24000).len(), 7200);
        assert_eq!(Cue::StartPing.render(48000).len(), 14400);
    }

    #[test]
    fn test_cues_respect_master_gain() {
        for cue in Cue::ALL {
            let samples = cue.render(24000);
            let peak = pcm::peak_amplitude(&samples);
            assert!(peak > 0.0, "{} should not be silent", cue);
            assert!(
                peak <= 0.2 * defaults::CUE_MASTER_GAIN + 1e-6,
                "{} peak {} exceeds envelope",
                cue,
                peak
            );
        }
    }

    #[test]
    fn test_envelopes_decay() {
        for cue in Cue::ALL {
            let samples = cue.render(24000);
            let quarter = samples.len() / 4;
            let head = pcm::peak_amplitude(&samples[..quarter]);
            let tail = pcm::peak_amplitude(&samples[samples.len() - quarter..]);
            assert!(tail < head, "{} should fade out", cue);
        }
    }

    /// Mean frequency over `[from, to)` seconds, from zero crossings.
    fn frequency_between(samples: &[f32], rate: u32, from: f32, to: f32) -> f32 {
        let start = (from * rate as f32) as usize;
        let end = (to * rate as f32) as usize;
        let crossings = samples[start..end]
            .windows(2)
            .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
            .count();
        crossings as f32 / 2.0 / (to - from)
    }

    #[test]
    fn test_sweeps_reach_midpoint_frequency_at_150ms() {
        // Enter: 200 -> 600 Hz linear over 0.3 s.
        let enter = Cue::Enter.render(48000);
        let freq = frequency_between(&enter, 48000, 0.13, 0.17);
        assert!((freq - 400.0).abs() < 30.0, "enter at {} Hz", freq);

        // Start ping: 880 -> 440 Hz exponential over 0.3 s.
        let ping = Cue::StartPing.render(48000);
        let expected = 880.0 * 0.5f32.sqrt();
        let freq = frequency_between(&ping, 48000, 0.13, 0.17);
        assert!((freq - expected).abs() < 40.0, "start_ping at {} Hz", freq);
    }

    #[test]
    fn test_sweeps_settle_on_target_frequency() {
        let enter = Cue::Enter.render(48000);
        let freq = frequency_between(&enter, 48000, 0.3, 0.39);
        assert!((freq - 600.0).abs() < 30.0, "enter tail at {} Hz", freq);
    }

    #[test]
    fn test_enter_ends_silent() {
        let samples = Cue::Enter.render(24000);
        assert!(samples.last().unwrap().abs() < 1e-3);
    }

    #[test]
    fn test_parse_names() {
        for cue in Cue::ALL {
            assert_eq!(cue.name().parse::<Cue>().unwrap(), cue);
        }
        assert!("beep".parse::<Cue>().is_err());
    }

    #[test]
    fn test_oscillator_ranges() {
        for i in 0..100 {
            let phase = i as f32 / 100.0;
            for waveform in [Waveform::Sine, Waveform::Triangle, Waveform::Sawtooth] {
                let s = oscillate(waveform, phase);
                assert!((-1.0..=1.0).contains(&s));
            }
        }
    }
}
