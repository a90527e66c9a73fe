//! In-process transport double for tests.

use super::{Connector, OutboundMessage, OutboundSender, Transport, TransportEvent};
use crate::call_log::{self, CallLog};
use crate::error::{Result, VoxlinkError};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// The far end of a mock connection: push inbound messages, inspect outbound ones.
#[derive(Debug, Clone)]
pub struct MockRemote {
    url: String,
    events: Sender<TransportEvent>,
    outbound: Arc<Mutex<UnboundedReceiver<OutboundMessage>>>,
    closed: Arc<AtomicBool>,
}

impl MockRemote {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push_binary(&self, payload: Vec<u8>) -> bool {
        self.events.send(TransportEvent::Binary(payload)).is_ok()
    }

    pub fn push_text(&self, text: &str) -> bool {
        self.events
            .send(TransportEvent::Text(text.to_string()))
            .is_ok()
    }

    /// Drop the connection from the remote side.
    pub fn disconnect(&self, reason: &str) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(TransportEvent::Closed {
                reason: reason.to_string(),
            });
        }
    }

    /// True once either side has closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn outbound(&self) -> MutexGuard<'_, UnboundedReceiver<OutboundMessage>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait up to `timeout` for the next outbound message.
    pub fn recv_outbound(&self, timeout: Duration) -> Option<OutboundMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(message) = self.outbound().try_recv() {
                return Some(message);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Everything sent so far that has not been received yet.
    pub fn drain_outbound(&self) -> Vec<OutboundMessage> {
        let mut rx = self.outbound();
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

struct MockTransport {
    sender: OutboundSender,
    call_log: Option<CallLog>,
    outbound: Arc<Mutex<UnboundedReceiver<OutboundMessage>>>,
    closed: Arc<AtomicBool>,
}

impl Transport for MockTransport {
    fn sender(&self) -> OutboundSender {
        self.sender.clone()
    }

    fn close(&mut self) {
        call_log::record(self.call_log.as_ref(), "transport.close");
        self.closed.store(true, Ordering::SeqCst);
        // Queued messages stay readable; new sends fail.
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .close();
    }
}

#[derive(Debug, Default)]
struct MockConnectorState {
    remotes: Vec<MockRemote>,
    attempts: usize,
}

/// Connector that opens in-process connections, or fails on demand.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    should_fail: bool,
    close_on_connect: Option<String>,
    call_log: Option<CallLog>,
    state: Arc<Mutex<MockConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure every connect attempt to fail
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Have the remote hang up with `reason` right after each connect
    pub fn with_close_on_connect(mut self, reason: &str) -> Self {
        self.close_on_connect = Some(reason.to_string());
        self
    }

    /// Record `transport.close` in `log` whenever a transport is closed
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.call_log = Some(log);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockConnectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remote end of the most recent successful connection.
    pub fn remote(&self) -> Option<MockRemote> {
        self.lock().remotes.last().cloned()
    }

    /// Connect attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    pub fn connection_count(&self) -> usize {
        self.lock().remotes.len()
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &str, events: Sender<TransportEvent>) -> Result<Box<dyn Transport>> {
        let mut state = self.lock();
        state.attempts += 1;

        if self.should_fail {
            return Err(VoxlinkError::TransportConnect {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Arc::new(Mutex::new(rx));
        let closed = Arc::new(AtomicBool::new(false));

        let remote = MockRemote {
            url: url.to_string(),
            events,
            outbound: Arc::clone(&outbound),
            closed: Arc::clone(&closed),
        };
        if let Some(reason) = &self.close_on_connect {
            remote.disconnect(reason);
        }
        state.remotes.push(remote);

        Ok(Box::new(MockTransport {
            sender: OutboundSender::new(tx),
            call_log: self.call_log.clone(),
            outbound,
            closed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_connect_records_remote() {
        let connector = MockConnector::new();
        let (tx, rx) = bounded(4);

        let transport = connector.connect("ws://test/ws/A", tx).unwrap();
        let remote = connector.remote().unwrap();
        assert_eq!(remote.url(), "ws://test/ws/A");

        transport.sender().send_binary(vec![1, 2, 3]).unwrap();
        assert_eq!(
            remote.recv_outbound(Duration::from_millis(100)),
            Some(OutboundMessage::Binary(vec![1, 2, 3]))
        );

        assert!(remote.push_text("hi"));
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::Text("hi".to_string()));
    }

    #[test]
    fn test_connect_failure() {
        let connector = MockConnector::new().with_failure();
        let (tx, _rx) = bounded(1);

        match connector.connect("ws://test", tx) {
            Err(VoxlinkError::TransportConnect { url, .. }) => assert_eq!(url, "ws://test"),
            _ => panic!("Expected TransportConnect error"),
        }
        assert_eq!(connector.attempts(), 1);
        assert!(connector.remote().is_none());
    }

    #[test]
    fn test_close_rejects_further_sends() {
        let connector = MockConnector::new();
        let (tx, _rx) = bounded(1);
        let mut transport = connector.connect("ws://test", tx).unwrap();
        let sender = transport.sender();

        transport.close();

        assert!(connector.remote().unwrap().is_closed());
        assert!(sender.send_text("late".to_string()).is_err());
    }

    #[test]
    fn test_disconnect_emits_single_closed_event() {
        let connector = MockConnector::new();
        let (tx, rx) = bounded(4);
        let _transport = connector.connect("ws://test", tx).unwrap();
        let remote = connector.remote().unwrap();

        remote.disconnect("server restart");
        remote.disconnect("again");

        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Closed {
                reason: "server restart".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_on_connect_queues_closed_event() {
        let connector = MockConnector::new().with_close_on_connect("busy");
        let (tx, rx) = bounded(4);
        let _transport = connector.connect("ws://test", tx).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            TransportEvent::Closed {
                reason: "busy".to_string()
            }
        );
        assert!(connector.remote().unwrap().is_closed());
    }

    #[test]
    fn test_close_is_recorded_in_call_log() {
        let log = CallLog::new();
        let connector = MockConnector::new().with_call_log(log.clone());
        let (tx, _rx) = bounded(1);
        let mut transport = connector.connect("ws://test", tx).unwrap();

        transport.close();

        assert_eq!(log.calls(), vec!["transport.close"]);
    }
}
