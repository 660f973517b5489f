//! WebSocket message types
//!
//! Outbound frames sent to a bridge connection. Inbound frames are plain JSON
//! objects, validated against the command schemas before being deserialized
//! into the payloads of `bridge_core::message`.

use serde::Serialize;
use serde_json::Value;

/// Error code for a frame that failed schema validation
pub const ERR_INVALID_FORMAT: &str = "invalid_format";
/// Error code for an unknown `type`
pub const ERR_UNKNOWN_COMMAND: &str = "unknown_command";
/// Error code for a request id that did not increase
pub const ERR_ID_REUSE: &str = "id_reuse";

/// Outgoing WebSocket message to a client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    Result(ResultMessage),
    Event(EventMessage),
}

impl OutgoingMessage {
    /// Successful acknowledgement of request `id`
    pub fn ack(id: u64) -> Self {
        OutgoingMessage::Result(ResultMessage {
            id,
            msg_type: "result",
            success: true,
            result: None,
            error: None,
        })
    }

    /// Error reply to request `id`
    pub fn error(id: u64, code: &str, message: impl Into<String>) -> Self {
        OutgoingMessage::Result(ResultMessage {
            id,
            msg_type: "result",
            success: false,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.into(),
            }),
        })
    }

    /// Event addressed to the subscription opened by request `id`
    pub fn event(id: u64, event: Value) -> Self {
        OutgoingMessage::Event(EventMessage {
            id,
            msg_type: "event",
            event,
        })
    }

    /// Request id this message answers
    pub fn id(&self) -> u64 {
        match self {
            OutgoingMessage::Result(msg) => msg.id,
            OutgoingMessage::Event(msg) => msg.id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultMessage {
    pub id: u64,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMessage {
    pub id: u64,
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub event: Value,
}
