//! Capture and playback pipelines.
//!
//! Both are plain single-owner state machines driven by the session worker.
//! They hold no reference to each other or to the transport: capture gets a
//! send callback, playback gets a render/halt capability.

pub mod capture;
pub mod playback;

pub use capture::{BlockOutcome, CaptureAccumulator, CaptureConfig, CapturePipeline, FrameSender};
pub use playback::{PlaybackPipeline, PlaybackQueue};
