//! Wire messages exchanged with the endpoint.
//!
//! Binary frames are raw PCM. Text frames are JSON: the endpoint sends
//! `{"type": "LOG", "payload": {"msg": ...}}` for log lines and may send
//! other message types, which are ignored. Outbound text is a command
//! envelope `{"command": ...}`.

use crate::transport::TransportEvent;
use serde::Deserialize;

/// A routed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    TextLog(String),
    AudioChunk(Vec<u8>),
}

/// Payload of a `LOG` message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogPayload {
    pub msg: String,
    /// Origin of the line, e.g. `gemini`, `error` or `sys`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Inbound JSON message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "LOG")]
    Log {
        payload: LogPayload,
        #[serde(rename = "channelId", default)]
        channel_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

/// Encode an outbound text command envelope.
pub fn command_json(command: &str) -> String {
    serde_json::json!({ "command": command }).to_string()
}

impl ControlMessage {
    /// Classify a binary or text transport event.
    ///
    /// Returns None for close events, non-JSON text, JSON of an unknown
    /// type, and `LOG` messages without a `msg` string.
    pub fn from_event(event: TransportEvent) -> Option<Self> {
        match event {
            TransportEvent::Binary(payload) => Some(ControlMessage::AudioChunk(payload)),
            TransportEvent::Text(text) => parse_text(&text),
            TransportEvent::Closed { .. } => None,
        }
    }
}

/// Parse a text frame as a log line.
pub fn parse_text(text: &str) -> Option<ControlMessage> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(InboundMessage::Log {
            payload,
            channel_id,
        }) => {
            tracing::trace!(
                kind = payload.kind.as_deref().unwrap_or("-"),
                channel = channel_id.as_deref().unwrap_or("-"),
                "log message received"
            );
            Some(ControlMessage::TextLog(payload.msg))
        }
        Ok(InboundMessage::Other) => {
            tracing::debug!("ignoring text message of unknown type");
            None
        }
        Err(e) => {
            tracing::debug!("dropping malformed text message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_message_parses() {
        assert_eq!(
            parse_text(r#"{"type":"LOG","payload":{"msg":"hello"}}"#),
            Some(ControlMessage::TextLog("hello".to_string()))
        );
    }

    #[test]
    fn test_log_message_with_kind_and_channel() {
        let json = r#"{"type":"LOG","payload":{"msg":"ok","type":"gemini"},"channelId":"CENTRAL"}"#;
        let parsed: InboundMessage = serde_json::from_str(json).unwrap();

        assert_eq!(
            parsed,
            InboundMessage::Log {
                payload: LogPayload {
                    msg: "ok".to_string(),
                    kind: Some("gemini".to_string()),
                },
                channel_id: Some("CENTRAL".to_string()),
            }
        );
        assert_eq!(
            parse_text(json),
            Some(ControlMessage::TextLog("ok".to_string()))
        );
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        assert_eq!(parse_text(r#"{"type":"STATUS","payload":{}}"#), None);
    }

    #[test]
    fn test_malformed_text_is_dropped() {
        assert_eq!(parse_text("not json"), None);
        assert_eq!(parse_text(r#"{"payload":{"msg":"no type"}}"#), None);
        assert_eq!(parse_text(r#"{"type":"LOG","payload":{"msg":42}}"#), None);
        assert_eq!(parse_text(r#"{"type":"LOG"}"#), None);
    }

    #[test]
    fn test_binary_is_always_audio() {
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Binary(vec![1, 2])),
            Some(ControlMessage::AudioChunk(vec![1, 2]))
        );
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Binary(vec![])),
            Some(ControlMessage::AudioChunk(vec![]))
        );
    }

    #[test]
    fn test_closed_event_is_not_a_control_message() {
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Closed {
                reason: "bye".to_string()
            }),
            None
        );
    }

    #[test]
    fn test_command_json() {
        assert_eq!(
            command_json("status report"),
            r#"{"command":"status report"}"#
        );
        assert_eq!(command_json("say \"hi\""), r#"{"command":"say \"hi\""}"#);
    }
}
