//! Playback pipeline: ordered, non-overlapping rendering of inbound audio.

use crate::audio::frame::AudioFrame;
use crate::audio::pcm;
use crate::audio::sink::{RenderId, RenderUnit, Renderer};
use std::collections::VecDeque;

/// Pending render units plus the one currently rendering.
///
/// Units are appended in arrival order and never reordered. At most one
/// unit is active.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    pending: VecDeque<RenderUnit>,
    active: Option<RenderId>,
}

impl PlaybackQueue {
    pub fn push(&mut self, unit: RenderUnit) {
        self.pending.push_back(unit);
    }

    pub fn pop(&mut self) -> Option<RenderUnit> {
        self.pending.pop_front()
    }

    pub fn active(&self) -> Option<RenderId> {
        self.active
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.active = None;
        dropped
    }
}

/// Renders inbound frames one at a time, chaining on completion.
///
/// The pipeline owns only the render/halt capability; completion ids come
/// back from the output device and are fed in via
/// [`on_render_complete`](Self::on_render_complete).
pub struct PlaybackPipeline {
    renderer: Box<dyn Renderer>,
    queue: PlaybackQueue,
    next_id: u64,
    sample_rate: u32,
}

impl PlaybackPipeline {
    /// `sample_rate` is the rate of inbound frames.
    pub fn new(renderer: Box<dyn Renderer>, sample_rate: u32) -> Self {
        Self {
            renderer,
            queue: PlaybackQueue::default(),
            next_id: 0,
            sample_rate,
        }
    }

    /// Queue a decoded frame. Returns false if it carried no samples.
    pub fn enqueue(&mut self, frame: &AudioFrame) -> bool {
        self.enqueue_samples(frame.to_f32(), frame.sample_rate())
    }

    /// Queue a raw little-endian PCM payload at the inbound rate.
    pub fn enqueue_pcm(&mut self, bytes: &[u8]) -> bool {
        let samples: Vec<f32> = pcm::decode_le(bytes)
            .into_iter()
            .map(pcm::i16_to_f32)
            .collect();
        self.enqueue_samples(samples, self.sample_rate)
    }

    /// Queue already-normalized samples.
    pub fn enqueue_samples(&mut self, samples: Vec<f32>, sample_rate: u32) -> bool {
        if samples.is_empty() {
            tracing::debug!("dropping empty playback frame");
            return false;
        }

        self.next_id += 1;
        self.queue.push(RenderUnit {
            id: RenderId(self.next_id),
            samples,
            sample_rate,
        });

        if self.queue.active.is_none() {
            self.start_next();
        }
        true
    }

    /// Handle a completion signal. Stale or unknown ids are ignored.
    ///
    /// Returns true if `id` was the active render.
    pub fn on_render_complete(&mut self, id: RenderId) -> bool {
        if self.queue.active != Some(id) {
            tracing::trace!(%id, "ignoring stale render completion");
            return false;
        }
        self.queue.active = None;
        self.start_next();
        true
    }

    /// Halt the active render and discard everything queued.
    ///
    /// Returns the number of units that will never play, the halted one included.
    pub fn preempt(&mut self) -> usize {
        let halted = usize::from(self.queue.active.is_some());
        if halted > 0 {
            self.renderer.halt();
        }
        let dropped = self.queue.clear() + halted;
        if dropped > 0 {
            tracing::debug!(dropped, "playback preempted");
        }
        dropped
    }

    pub fn is_idle(&self) -> bool {
        self.queue.active.is_none() && self.queue.pending.is_empty()
    }

    pub fn active(&self) -> Option<RenderId> {
        self.queue.active()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }

    /// Start the queue head. A unit the device refuses is skipped.
    fn start_next(&mut self) {
        while let Some(unit) = self.queue.pop() {
            let id = unit.id;
            match self.renderer.render(unit) {
                Ok(()) => {
                    self.queue.active = Some(id);
                    return;
                }
                Err(e) => tracing::warn!(%id, "render failed, skipping: {}", e),
            }
        }
    }
}
