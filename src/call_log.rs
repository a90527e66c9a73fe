//! Shared record of calls made on test doubles.
//!
//! Hand one [`CallLog`] to several mocks to assert the order in which the
//! session drives different devices.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<&'static str>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, call: &'static str) {
        self.lock().push(call);
    }

    /// Calls recorded so far, oldest first.
    pub fn calls(&self) -> Vec<&'static str> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Record `call` if a log is attached.
pub(crate) fn record(log: Option<&CallLog>, call: &'static str) {
    if let Some(log) = log {
        log.record(call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let log = CallLog::new();
        let other = log.clone();

        log.record("a");
        other.record("b");

        assert_eq!(log.calls(), vec!["a", "b"]);
        other.clear();
        assert!(log.calls().is_empty());
    }
}
