//! WebSocket transport built on `tokio-tungstenite`.
//!
//! Each connection runs on its own thread with a current-thread tokio
//! runtime, so callers stay synchronous: `connect` blocks until the
//! handshake finishes or times out, outbound messages are queued on an
//! unbounded channel, and inbound messages are forwarded on the bounded
//! event channel. A full event channel drops inbound messages rather than
//! stalling outbound traffic.

use super::{Connector, OutboundMessage, OutboundSender, Transport, TransportEvent};
use crate::defaults;
use crate::error::{Result, VoxlinkError};
use crate::sys;
use crossbeam_channel::{Sender, TrySendError};
use futures_util::{SinkExt, StreamExt};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Time allowed for the connection thread to finish after a local close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type ReadySender = crossbeam_channel::Sender<std::result::Result<(), String>>;

/// Opens WebSocket connections.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_millis(defaults::CONNECT_TIMEOUT_MS))
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: &str, events: Sender<TransportEvent>) -> Result<Box<dyn Transport>> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let target = url.to_string();
        let timeout = self.connect_timeout;

        let handle = thread::Builder::new()
            .name("voxlink-transport".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("failed to start runtime: {}", e)));
                        return;
                    }
                };
                runtime.block_on(run_connection(
                    target,
                    timeout,
                    outbound_rx,
                    events,
                    ready_tx,
                ));
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(WebSocketTransport {
                sender: OutboundSender::new(outbound_tx),
                handle: Some(handle),
            })),
            Ok(Err(message)) => {
                sys::join_with_deadline(handle, CLOSE_TIMEOUT, "voxlink-transport");
                Err(VoxlinkError::TransportConnect {
                    url: url.to_string(),
                    message,
                })
            }
            Err(_) => Err(VoxlinkError::TransportConnect {
                url: url.to_string(),
                message: "connection thread exited before the handshake".to_string(),
            }),
        }
    }
}

/// An open WebSocket connection. Closes on drop.
struct WebSocketTransport {
    sender: OutboundSender,
    handle: Option<JoinHandle<()>>,
}

impl Transport for WebSocketTransport {
    fn sender(&self) -> OutboundSender {
        self.sender.clone()
    }

    fn close(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        // Ignored if the connection already ended on its own.
        let _ = self.sender.send(OutboundMessage::Close);
        sys::join_with_deadline(handle, CLOSE_TIMEOUT, "voxlink-transport");
        tracing::info!("transport closed");
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    url: String,
    timeout: Duration,
    mut outbound: UnboundedReceiver<OutboundMessage>,
    events: Sender<TransportEvent>,
    ready: ReadySender,
) {
    let stream = match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
        Err(_) => {
            let _ = ready.send(Err(format!(
                "handshake timed out after {}ms",
                timeout.as_millis()
            )));
            return;
        }
    };

    tracing::info!(%url, "transport connected");
    let _ = ready.send(Ok(()));

    let (mut sink, mut stream) = stream.split();
    let mut dropped = 0u64;

    // None: closed locally; Some(reason): ended by the remote or the network.
    let ended: Option<String> = loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(OutboundMessage::Binary(payload)) => {
                    if let Err(e) = sink.send(Message::Binary(payload)).await {
                        break Some(format!("send failed: {}", e));
                    }
                }
                Some(OutboundMessage::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        break Some(format!("send failed: {}", e));
                    }
                }
                Some(OutboundMessage::Close) | None => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!("close frame not sent: {}", e);
                    }
                    break None;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Binary(payload))) => {
                    if !forward_inbound(&events, TransportEvent::Binary(payload), &mut dropped) {
                        break None;
                    }
                }
                Some(Ok(Message::Text(text))) => {
                    if !forward_inbound(&events, TransportEvent::Text(text), &mut dropped) {
                        break None;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break Some(match frame {
                        Some(frame) if !frame.reason.is_empty() => {
                            format!("closed by remote ({}): {}", u16::from(frame.code), frame.reason)
                        }
                        Some(frame) => format!("closed by remote ({})", u16::from(frame.code)),
                        None => "closed by remote".to_string(),
                    });
                }
                // Ping/pong are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break Some("connection ended".to_string()),
            },
        }
    };

    if dropped > 0 {
        tracing::warn!(dropped, "inbound messages dropped while the session was busy");
    }
    if let Some(reason) = ended {
        tracing::warn!(%reason, "transport closed unexpectedly");
        let _ = events.send(TransportEvent::Closed { reason });
    }
}

/// Hand an inbound message to the session without blocking the runtime.
///
/// Returns false once the session has stopped listening.
fn forward_inbound(
    events: &Sender<TransportEvent>,
    event: TransportEvent,
    dropped: &mut u64,
) -> bool {
    match events.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            *dropped += 1;
            if *dropped == 1 {
                tracing::warn!("session event queue full, dropping inbound messages");
            }
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
