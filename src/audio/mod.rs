//! Audio devices, sample formats and cue tones.

pub mod cue;
pub mod devices;
pub mod frame;
pub mod pcm;
pub mod sink;
pub mod source;
pub mod wav;

#[cfg(feature = "cpal-audio")]
pub mod capture;
#[cfg(feature = "cpal-audio")]
pub mod playback;

pub use cue::Cue;
pub use devices::{AudioDevices, InputSelection, MockDevices};
pub use frame::AudioFrame;
pub use sink::{AudioOutput, MockOutput, RenderId, RenderUnit, Renderer};
pub use source::{MicrophoneSource, MockMicrophone};
pub use wav::WavMicrophone;

#[cfg(feature = "cpal-audio")]
pub use capture::CpalMicrophone;
#[cfg(feature = "cpal-audio")]
pub use devices::{CpalDevices, list_input_devices, list_output_devices};
#[cfg(feature = "cpal-audio")]
pub use playback::CpalSpeaker;
