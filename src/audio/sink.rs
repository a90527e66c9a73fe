//! Audio output capability and its test double.
//!
//! An [`AudioOutput`] is the device context: it is opened once per session
//! and yields a [`Renderer`], the narrow render/halt capability handed to the
//! playback pipeline. Completions travel back over a channel so the device
//! thread never calls into the pipeline directly.

use crate::call_log::{self, CallLog};
use crate::error::{Result, VoxlinkError};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identity of one submitted render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderId(pub u64);

impl fmt::Display for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Normalized samples ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderUnit {
    pub id: RenderId,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Render one unit at a time.
pub trait Renderer: Send {
    /// Begin rendering `unit`. When it finishes, its id is sent exactly
    /// once on the completion channel given to [`AudioOutput::open`].
    fn render(&mut self, unit: RenderUnit) -> Result<()>;

    /// Forcibly stop the active render. A halted render never completes.
    fn halt(&mut self);
}

/// An output device context with an explicit open/close lifecycle.
pub trait AudioOutput: Send {
    fn open(&mut self, completions: Sender<RenderId>) -> Result<Box<dyn Renderer>>;

    /// Release the device. Safe to call when not open.
    fn close(&mut self);
}

/// One render observed by [`MockOutput`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRecord {
    pub id: RenderId,
    pub samples: Vec<f32>,
}

#[derive(Debug, Default)]
struct MockOutputState {
    completions: Option<Sender<RenderId>>,
    rendered: Vec<RenderRecord>,
    active: Option<RenderId>,
    open_count: usize,
    close_count: usize,
    halt_count: usize,
    overlap_count: usize,
}

/// Output device double that records renders and completes them on demand.
#[derive(Debug, Clone)]
pub struct MockOutput {
    should_fail_open: bool,
    should_fail_render: bool,
    call_log: Option<CallLog>,
    state: Arc<Mutex<MockOutputState>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self {
            should_fail_open: false,
            should_fail_render: false,
            call_log: None,
            state: Arc::new(Mutex::new(MockOutputState::default())),
        }
    }

    /// Configure the mock to fail on open
    pub fn with_open_failure(mut self) -> Self {
        self.should_fail_open = true;
        self
    }

    /// Configure every render to fail
    pub fn with_render_failure(mut self) -> Self {
        self.should_fail_render = true;
        self
    }

    /// Record `render.halt` and `output.close` in `log`
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockOutputState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every render started so far, in submission order.
    pub fn rendered(&self) -> Vec<RenderRecord> {
        self.lock().rendered.clone()
    }

    pub fn render_count(&self) -> usize {
        self.lock().rendered.len()
    }

    /// Currently rendering unit, if any.
    pub fn active(&self) -> Option<RenderId> {
        self.lock().active
    }

    pub fn halt_count(&self) -> usize {
        self.lock().halt_count
    }

    /// Renders started while another was still active.
    pub fn overlap_count(&self) -> usize {
        self.lock().overlap_count
    }

    pub fn is_open(&self) -> bool {
        self.lock().completions.is_some()
    }

    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Finish the active render as the device would.
    ///
    /// Returns the completed id, or None when nothing is rendering.
    pub fn complete_active(&self) -> Option<RenderId> {
        let mut state = self.lock();
        let id = state.active.take()?;
        if let Some(tx) = &state.completions {
            let _ = tx.try_send(id);
        }
        Some(id)
    }
}

impl Default for MockOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for MockOutput {
    fn open(&mut self, completions: Sender<RenderId>) -> Result<Box<dyn Renderer>> {
        if self.should_fail_open {
            return Err(VoxlinkError::AudioPlayback {
                message: "mock output unavailable".to_string(),
            });
        }
        let mut state = self.lock();
        state.completions = Some(completions);
        state.open_count += 1;
        Ok(Box::new(MockRenderer {
            should_fail: self.should_fail_render,
            call_log: self.call_log.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    fn close(&mut self) {
        call_log::record(self.call_log.as_ref(), "output.close");
        let mut state = self.lock();
        state.completions = None;
        state.active = None;
        state.close_count += 1;
    }
}

struct MockRenderer {
    should_fail: bool,
    call_log: Option<CallLog>,
    state: Arc<Mutex<MockOutputState>>,
}

impl Renderer for MockRenderer {
    fn render(&mut self, unit: RenderUnit) -> Result<()> {
        if self.should_fail {
            return Err(VoxlinkError::AudioPlayback {
                message: format!("mock render failure for {}", unit.id),
            });
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.active.is_some() {
            state.overlap_count += 1;
        }
        state.active = Some(unit.id);
        state.rendered.push(RenderRecord {
            id: unit.id,
            samples: unit.samples,
        });
        Ok(())
    }

    fn halt(&mut self) {
        call_log::record(self.call_log.as_ref(), "render.halt");
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.active.take().is_some() {
            state.halt_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn unit(id: u64) -> RenderUnit {
        RenderUnit {
            id: RenderId(id),
            samples: vec![0.1; 4],
            sample_rate: 24000,
        }
    }

    #[test]
    fn test_complete_active_sends_completion() {
        let mut output = MockOutput::new();
        let (tx, rx) = bounded(4);
        let mut renderer = output.open(tx).unwrap();

        renderer.render(unit(1)).unwrap();
        assert_eq!(output.active(), Some(RenderId(1)));

        assert_eq!(output.complete_active(), Some(RenderId(1)));
        assert_eq!(rx.try_recv().unwrap(), RenderId(1));
        assert_eq!(output.complete_active(), None);
    }

    #[test]
    fn test_halted_render_never_completes() {
        let mut output = MockOutput::new();
        let (tx, rx) = bounded(4);
        let mut renderer = output.open(tx).unwrap();

        renderer.render(unit(7)).unwrap();
        renderer.halt();

        assert_eq!(output.halt_count(), 1);
        assert_eq!(output.complete_active(), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_overlap_is_counted() {
        let mut output = MockOutput::new();
        let (tx, _rx) = bounded(4);
        let mut renderer = output.open(tx).unwrap();

        renderer.render(unit(1)).unwrap();
        renderer.render(unit(2)).unwrap();

        assert_eq!(output.overlap_count(), 1);
    }

    #[test]
    fn test_open_failure() {
        let mut output = MockOutput::new().with_open_failure();
        let (tx, _rx) = bounded(1);

        assert!(output.open(tx).is_err());
        assert!(!output.is_open());
    }

    #[test]
    fn test_close_releases_completion_channel() {
        let mut output = MockOutput::new();
        let (tx, rx) = bounded(1);
        let _renderer = output.open(tx).unwrap();

        output.close();

        assert!(!output.is_open());
        assert_eq!(output.close_count(), 1);
        drop(_renderer);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_call_log_records_halt_and_close() {
        let log = CallLog::new();
        let mut output = MockOutput::new().with_call_log(log.clone());
        let (tx, _rx) = bounded(4);
        let mut renderer = output.open(tx).unwrap();

        renderer.render(unit(1)).unwrap();
        renderer.halt();
        output.close();

        assert_eq!(log.calls(), vec!["render.halt", "output.close"]);
    }
}
