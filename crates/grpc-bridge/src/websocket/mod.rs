//! Bridge WebSocket API
//!
//! The six `bridge/entity/*` commands a remote gRPC service drives the
//! integration with.
//!
//! This module is organized into:
//! - `types` - outgoing message types and error codes
//! - `connection` - per-connection state and the lost-connection table
//! - `schema` - JSON schemas of the inbound commands
//! - `dispatch` - the gateway validating and publishing inbound frames

mod connection;
mod dispatch;
mod schema;
mod types;

pub use connection::{ActiveConnection, LostConnectionCallback, OUTBOUND_CAPACITY};
pub use dispatch::Gateway;
pub use schema::CommandSchemas;
pub use types::{
    ErrorInfo, EventMessage, OutgoingMessage, ResultMessage, ERR_ID_REUSE, ERR_INVALID_FORMAT,
    ERR_UNKNOWN_COMMAND,
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_ack() {
        let value = serde_json::to_value(OutgoingMessage::ack(4)).unwrap();
        assert_eq!(value, json!({"id": 4, "type": "result", "success": true}));
    }

    #[test]
    fn test_serialize_error() {
        let msg = OutgoingMessage::error(5, ERR_INVALID_FORMAT, "/platform: bad");
        let value = serde_json::to_value(msg).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 5,
                "type": "result",
                "success": false,
                "error": {"code": "invalid_format", "message": "/platform: bad"}
            })
        );
    }

    #[test]
    fn test_serialize_event() {
        let msg = OutgoingMessage::event(9, json!({"type": "state_changed", "state": true}));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"id\":9"));
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"state\":true"));
    }
}
