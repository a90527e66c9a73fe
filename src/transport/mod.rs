//! Bidirectional message transport to the conversational endpoint.
//!
//! A [`Connector`] opens a [`Transport`] and returns once the connection is
//! established or has failed. Inbound messages are delivered as
//! [`TransportEvent`]s on a bounded channel; outbound sends go through an
//! [`OutboundSender`] and never block the caller.

pub mod mock;
pub mod websocket;

pub use mock::{MockConnector, MockRemote};
pub use websocket::WebSocketConnector;

use crate::error::{Result, VoxlinkError};
use crossbeam_channel::Sender;
use tokio::sync::mpsc::UnboundedSender;

/// An event produced by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Binary(Vec<u8>),
    Text(String),
    /// The connection ended without a local close. Sent at most once.
    Closed { reason: String },
}

/// A message queued for the connection's writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Binary(Vec<u8>),
    Text(String),
    Close,
}

/// Fire-and-forget handle for outbound messages.
///
/// Clones share the same connection. Sends fail only once the connection
/// is gone.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: UnboundedSender<OutboundMessage>,
}

impl OutboundSender {
    pub fn new(tx: UnboundedSender<OutboundMessage>) -> Self {
        Self { tx }
    }

    pub fn send_binary(&self, payload: Vec<u8>) -> Result<()> {
        self.send(OutboundMessage::Binary(payload))
    }

    pub fn send_text(&self, text: String) -> Result<()> {
        self.send(OutboundMessage::Text(text))
    }

    fn send(&self, message: OutboundMessage) -> Result<()> {
        self.tx
            .send(message)
            .map_err(|_| VoxlinkError::TransportSend {
                message: "connection closed".to_string(),
            })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// An open connection.
pub trait Transport: Send {
    /// Handle for queuing outbound messages.
    fn sender(&self) -> OutboundSender;

    /// Close the connection. No `Closed` event is emitted for a local close.
    fn close(&mut self);
}

/// Opens transports.
pub trait Connector: Send + Sync {
    /// Open a connection to `url`, delivering inbound events on `events`.
    fn connect(&self, url: &str, events: Sender<TransportEvent>) -> Result<Box<dyn Transport>>;
}
