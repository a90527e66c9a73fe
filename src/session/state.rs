//! Session lifecycle state machine.

use crossbeam_channel::Sender;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Lifecycle state of a voice session.
///
/// Transitions run forward `Idle → Connecting → Live → Stopping → Stopped`,
/// with `Stopped → Idle` as the only reset. `Connecting → Idle` covers a
/// transport that never opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Live,
    Stopping,
    Stopped,
}

impl SessionState {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Live)
                | (Connecting, Stopping)
                | (Connecting, Idle)
                | (Live, Stopping)
                | (Stopping, Stopped)
                | (Stopped, Idle)
        )
    }

    /// Connecting or Live: a session owns devices and a transport.
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Live)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Live => "live",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Informational events published by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// The transport closed without a local `stop()`. Teardown has completed
    /// by the time this is published.
    Disconnected { reason: String },
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid session transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Shared, observable session state.
///
/// Written by the controller and its worker thread; every accepted
/// transition is published on the event channel. Publishing never blocks:
/// a full event channel drops the event.
#[derive(Clone)]
pub struct StateCell {
    state: Arc<RwLock<SessionState>>,
    events: Sender<SessionEvent>,
}

impl StateCell {
    pub fn new(events: Sender<SessionEvent>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Idle)),
            events,
        }
    }

    pub fn get(&self) -> SessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `to` if legal from the current state.
    pub fn transition(&self, to: SessionState) -> Result<SessionState, InvalidTransition> {
        let from = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let from = *state;
            if !from.can_transition_to(to) {
                return Err(InvalidTransition { from, to });
            }
            *state = to;
            from
        };

        tracing::debug!(%from, %to, "session state changed");
        self.publish(SessionEvent::StateChanged { from, to });
        Ok(from)
    }

    pub fn publish(&self, event: SessionEvent) {
        if self.events.try_send(event).is_err() {
            tracing::debug!("session event dropped: no capacity or no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_forward_path_is_legal() {
        use SessionState::*;
        let path = [Idle, Connecting, Live, Stopping, Stopped, Idle];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_skipping_stopping_is_illegal() {
        use SessionState::*;
        assert!(!Live.can_transition_to(Stopped));
        assert!(!Live.can_transition_to(Idle));
        assert!(!Connecting.can_transition_to(Stopped));
        assert!(!Idle.can_transition_to(Live));
        assert!(!Stopped.can_transition_to(Connecting));
        assert!(!Live.can_transition_to(Live));
    }

    #[test]
    fn test_connecting_can_revert_to_idle() {
        assert!(SessionState::Connecting.can_transition_to(SessionState::Idle));
    }

    #[test]
    fn test_is_active() {
        assert!(SessionState::Connecting.is_active());
        assert!(SessionState::Live.is_active());
        assert!(!SessionState::Idle.is_active());
        assert!(!SessionState::Stopping.is_active());
        assert!(!SessionState::Stopped.is_active());
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
        assert_eq!(SessionState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_state_cell_publishes_transitions() {
        let (tx, rx) = bounded(8);
        let cell = StateCell::new(tx);

        assert_eq!(cell.get(), SessionState::Idle);
        assert_eq!(
            cell.transition(SessionState::Connecting),
            Ok(SessionState::Idle)
        );
        assert_eq!(cell.get(), SessionState::Connecting);

        assert_eq!(
            rx.try_recv().ok(),
            Some(SessionEvent::StateChanged {
                from: SessionState::Idle,
                to: SessionState::Connecting
            })
        );
    }

    #[test]
    fn test_state_cell_rejects_illegal_transition() {
        let (tx, rx) = bounded(8);
        let cell = StateCell::new(tx);

        let err = cell.transition(SessionState::Live).unwrap_err();
        assert_eq!(err.from, SessionState::Idle);
        assert_eq!(err.to, SessionState::Live);
        assert_eq!(cell.get(), SessionState::Idle);
        assert!(rx.try_recv().is_err());
        assert_eq!(err.to_string(), "invalid session transition idle -> live");
    }

    #[test]
    fn test_state_cell_does_not_block_when_events_full() {
        let (tx, _rx) = bounded(1);
        let cell = StateCell::new(tx);

        cell.transition(SessionState::Connecting).unwrap();
        cell.transition(SessionState::Live).unwrap();
        cell.transition(SessionState::Stopping).unwrap();

        assert_eq!(cell.get(), SessionState::Stopping);
    }
}
