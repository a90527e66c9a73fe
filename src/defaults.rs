//! Default configuration constants for voxlink.
//!
//! Shared by the config file types, the pipelines and the CLI so every layer
//! agrees on the same wire format and tuning.

/// Sample rate of outbound frames sent to the endpoint, in Hz.
pub const OUTBOUND_SAMPLE_RATE: u32 = 16000;

/// Sample rate of inbound frames received from the endpoint, in Hz.
pub const INBOUND_SAMPLE_RATE: u32 = 24000;

/// Every frame on the wire is mono.
pub const CHANNELS: u16 = 1;

/// Samples per capture block at the device's native rate.
///
/// 4096 samples at 48kHz is ~85ms, which keeps end-to-end capture latency
/// near 100ms.
pub const BLOCK_SIZE: usize = 4096;

/// Gain applied to captured samples before clipping.
pub const GAIN: f32 = 1.2;

/// Peak amplitude below which a block counts as silence.
///
/// 0.02 picks up too much room noise to ever register as silent; 0.05 lets
/// the gate close as soon as the speaker stops.
pub const GATE_THRESHOLD: f32 = 0.05;

/// Buffered outbound samples that trigger a flush (~0.25s at 16kHz).
pub const FLUSH_THRESHOLD: usize = 4000;

/// Log the microphone peak level every this many blocks (0 disables).
pub const LEVEL_LOG_INTERVAL: u64 = 20;

/// Default conversational endpoint.
pub const ENDPOINT: &str = "ws://127.0.0.1:8000/ws/CENTRAL";

/// Time allowed for the transport handshake.
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Capacity of the capture block handoff between the device thread and the session.
pub const BLOCK_BUFFER: usize = 32;

/// Capacity of the inbound transport event handoff.
pub const EVENT_BUFFER: usize = 256;

/// Master gain for synthesized cue tones.
pub const CUE_MASTER_GAIN: f32 = 0.3;
