//! Device acquisition.
//!
//! The session controller asks an [`AudioDevices`] for a fresh microphone
//! and output device on every `start`, so device errors surface before any
//! connection is made.

use crate::audio::sink::{AudioOutput, MockOutput};
use crate::audio::source::{MicrophoneSource, MockMicrophone};
use crate::error::{Result, VoxlinkError};
use std::path::PathBuf;

/// Factory for one microphone/output pair per session.
pub trait AudioDevices: Send + Sync {
    fn microphone(&self) -> Result<Box<dyn MicrophoneSource>>;
    fn output(&self) -> Result<Box<dyn AudioOutput>>;
}

/// Where microphone audio comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSelection {
    /// A capture device by name, or the preferred default.
    Device(Option<String>),
    /// A WAV file streamed at real-time pace.
    Wav(PathBuf),
}

impl Default for InputSelection {
    fn default() -> Self {
        InputSelection::Device(None)
    }
}

/// Test devices handing out shared mock handles.
#[derive(Debug, Clone)]
pub struct MockDevices {
    pub microphone: MockMicrophone,
    pub output: MockOutput,
    microphone_unavailable: bool,
    output_unavailable: bool,
}

impl MockDevices {
    pub fn new(microphone: MockMicrophone, output: MockOutput) -> Self {
        Self {
            microphone,
            output,
            microphone_unavailable: false,
            output_unavailable: false,
        }
    }

    /// Configure the microphone to be missing
    pub fn with_microphone_unavailable(mut self) -> Self {
        self.microphone_unavailable = true;
        self
    }

    /// Configure the output device to be missing
    pub fn with_output_unavailable(mut self) -> Self {
        self.output_unavailable = true;
        self
    }
}

impl AudioDevices for MockDevices {
    fn microphone(&self) -> Result<Box<dyn MicrophoneSource>> {
        if self.microphone_unavailable {
            return Err(VoxlinkError::AudioDeviceNotFound {
                device: "mock microphone".to_string(),
            });
        }
        Ok(Box::new(self.microphone.clone()))
    }

    fn output(&self) -> Result<Box<dyn AudioOutput>> {
        if self.output_unavailable {
            return Err(VoxlinkError::AudioDeviceNotFound {
                device: "mock output".to_string(),
            });
        }
        Ok(Box::new(self.output.clone()))
    }
}

#[cfg(feature = "cpal-audio")]
pub use cpal_devices::*;

#[cfg(feature = "cpal-audio")]
mod cpal_devices {
    use super::{AudioDevices, InputSelection};
    use crate::audio::capture::CpalMicrophone;
    use crate::audio::playback::CpalSpeaker;
    use crate::audio::sink::AudioOutput;
    use crate::audio::source::MicrophoneSource;
    use crate::audio::wav::WavMicrophone;
    use crate::error::{Result, VoxlinkError};
    use crate::sys::with_suppressed_stderr;
    use cpal::traits::{DeviceTrait, HostTrait};

    /// Preferred device names for PipeWire/PulseAudio desktops.
    const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

    /// Device name patterns that are never a voice microphone or speaker.
    const FILTERED_PATTERNS: &[&str] = &[
        "surround",
        "front:",
        "rear:",
        "center:",
        "side:",
        "Digital Output",
        "HDMI",
        "S/PDIF",
    ];

    pub(crate) fn should_filter_device(name: &str) -> bool {
        let lower = name.to_lowercase();
        FILTERED_PATTERNS
            .iter()
            .any(|pattern| lower.contains(&pattern.to_lowercase()))
    }

    pub(crate) fn is_preferred_device(name: &str) -> bool {
        let lower = name.to_lowercase();
        PREFERRED_DEVICES
            .iter()
            .any(|pref| lower.contains(&pref.to_lowercase()))
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Direction {
        Input,
        Output,
    }

    fn enumerate(host: &cpal::Host, direction: Direction) -> Result<Vec<cpal::Device>> {
        let devices: Vec<cpal::Device> = match direction {
            Direction::Input => host.input_devices().map(|d| d.collect::<Vec<_>>()),
            Direction::Output => host.output_devices().map(|d| d.collect::<Vec<_>>()),
        }
        .map_err(|e| VoxlinkError::AudioCapture {
            message: format!("Failed to enumerate devices: {}", e),
        })?;
        Ok(devices)
    }

    /// Names of usable devices, preferred ones marked "\[recommended\]".
    fn list(direction: Direction) -> Result<Vec<String>> {
        let devices = with_suppressed_stderr(|| enumerate(&cpal::default_host(), direction))?;

        Ok(devices
            .iter()
            .filter_map(|device| device.name().ok())
            .filter(|name| !should_filter_device(name))
            .map(|name| {
                if is_preferred_device(&name) {
                    format!("{} [recommended]", name)
                } else {
                    name
                }
            })
            .collect())
    }

    /// List capture devices.
    pub fn list_input_devices() -> Result<Vec<String>> {
        list(Direction::Input)
    }

    /// List playback devices.
    pub fn list_output_devices() -> Result<Vec<String>> {
        list(Direction::Output)
    }

    /// Find a device by exact name, or the best default: PipeWire, then
    /// PulseAudio, then the host default.
    pub fn find_device(name: Option<&str>, direction: Direction) -> Result<cpal::Device> {
        with_suppressed_stderr(|| {
            let host = cpal::default_host();
            let devices = enumerate(&host, direction)?;

            if let Some(name) = name {
                return devices
                    .into_iter()
                    .find(|device| device.name().is_ok_and(|n| n == name))
                    .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                        device: name.to_string(),
                    });
            }

            if let Some(device) = devices
                .into_iter()
                .find(|device| device.name().is_ok_and(|n| is_preferred_device(&n)))
            {
                return Ok(device);
            }

            match direction {
                Direction::Input => host.default_input_device(),
                Direction::Output => host.default_output_device(),
            }
            .ok_or_else(|| VoxlinkError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
        })
    }

    /// Real devices via cpal.
    #[derive(Debug, Clone, Default)]
    pub struct CpalDevices {
        pub input: InputSelection,
        pub output_device: Option<String>,
        pub block_size: usize,
    }

    impl CpalDevices {
        pub fn new(input: InputSelection, output_device: Option<String>, block_size: usize) -> Self {
            Self {
                input,
                output_device,
                block_size,
            }
        }
    }

    impl AudioDevices for CpalDevices {
        fn microphone(&self) -> Result<Box<dyn MicrophoneSource>> {
            match &self.input {
                InputSelection::Device(name) => Ok(Box::new(CpalMicrophone::new(
                    name.as_deref(),
                    self.block_size,
                )?)),
                InputSelection::Wav(path) => {
                    Ok(Box::new(WavMicrophone::open(path, self.block_size)?))
                }
            }
        }

        fn output(&self) -> Result<Box<dyn AudioOutput>> {
            Ok(Box::new(CpalSpeaker::new(self.output_device.as_deref())?))
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_devices_share_handles() {
        let devices = MockDevices::new(MockMicrophone::new(48000), MockOutput::new());
        let mic = devices.microphone().unwrap();

        assert_eq!(mic.sample_rate(), 48000);
        assert!(devices.output().is_ok());
    }

    #[test]
    fn test_mock_devices_unavailable() {
        let devices = MockDevices::new(MockMicrophone::new(48000), MockOutput::new())
            .with_microphone_unavailable();

        assert!(matches!(
            devices.microphone(),
            Err(VoxlinkError::AudioDeviceNotFound { .. })
        ));

        let devices = MockDevices::new(MockMicrophone::new(48000), MockOutput::new())
            .with_output_unavailable();
        assert!(devices.output().is_err());
    }
}
