//! WebSocket message dispatch
//!
//! The [`Gateway`] validates inbound frames and re-publishes them on the
//! integration bus. It holds no state besides the compiled schemas.

use std::sync::Arc;

use bridge_core::message::{
    TYPE_ADD, TYPE_AVAILABLE, TYPE_CONFIG, TYPE_EVENT, TYPE_REMOVE, TYPE_STATE,
};
use bridge_core::{
    AddMessage, AvailableMessage, BridgeError, BridgeResult, ConfigMessage, EventMessage,
    RemoveMessage, StateMessage,
};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::topics::{BridgeBus, Discovered, Signal, Topic};

use super::connection::ActiveConnection;
use super::schema::CommandSchemas;
use super::types::{OutgoingMessage, ERR_INVALID_FORMAT, ERR_UNKNOWN_COMMAND};

/// Entry point of inbound bridge commands
pub struct Gateway {
    schemas: CommandSchemas,
    bus: Arc<BridgeBus>,
}

impl Gateway {
    pub fn new(bus: Arc<BridgeBus>) -> BridgeResult<Self> {
        Ok(Self {
            schemas: CommandSchemas::compile()?,
            bus,
        })
    }

    pub fn bus(&self) -> &Arc<BridgeBus> {
        &self.bus
    }

    /// Handle a raw text frame
    pub async fn handle_text(&self, conn: &Arc<ActiveConnection>, text: &str) -> BridgeResult<()> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.handle_message(conn, value).await,
            Err(e) => {
                let reason = format!("Message incorrectly formatted: {e}");
                self.reject(conn, 0, ERR_INVALID_FORMAT, reason).await
            }
        }
    }

    /// Handle a parsed frame
    ///
    /// The acknowledgement is queued before the command is published, so it
    /// never waits on the pipeline behind it. A rejected frame gets an error
    /// reply and publishes nothing.
    #[instrument(skip_all, fields(connection = %conn.id()))]
    pub async fn handle_message(
        &self,
        conn: &Arc<ActiveConnection>,
        value: Value,
    ) -> BridgeResult<()> {
        let id = value.get("id").and_then(Value::as_u64).unwrap_or_default();
        let Some(msg_type) = value.get("type").and_then(Value::as_str).map(str::to_string) else {
            return self
                .reject(conn, id, ERR_INVALID_FORMAT, "Message incorrectly formatted.")
                .await;
        };
        if id == 0 {
            return self
                .reject(conn, id, ERR_INVALID_FORMAT, "Message incorrectly formatted.")
                .await;
        }

        if let Err(code) = conn.validate_id(id) {
            return self
                .reject(conn, id, code, "Identifier values have to increase.")
                .await;
        }
        if !self.schemas.contains(&msg_type) {
            return self
                .reject(conn, id, ERR_UNKNOWN_COMMAND, "Unknown command.")
                .await;
        }
        if let Err(reason) = self.schemas.validate(&msg_type, &value) {
            return self.reject(conn, id, ERR_INVALID_FORMAT, reason).await;
        }

        let (topic, signal) = match decode(&msg_type, value, conn) {
            Ok(routed) => routed,
            Err(e) => return self.reject(conn, id, ERR_INVALID_FORMAT, e.to_string()).await,
        };

        if let Err(e) = conn.send(OutgoingMessage::ack(id)).await {
            warn!(id, error = %e, "Could not acknowledge message");
        }

        let delivered = self.bus.publish(&topic, signal).await;
        debug!(id, msg_type = %msg_type, delivered, "Dispatched message");
        Ok(())
    }

    async fn reject(
        &self,
        conn: &ActiveConnection,
        id: u64,
        code: &str,
        message: impl Into<String>,
    ) -> BridgeResult<()> {
        let message = message.into();
        warn!(id, code, %message, "Rejected message");
        if let Err(e) = conn.send(OutgoingMessage::error(id, code, message.clone())).await {
            debug!(id, error = %e, "Could not send error reply");
        }
        Err(BridgeError::InvalidMessage(message))
    }
}

/// Deserialize a validated frame and pick its topic
fn decode(
    msg_type: &str,
    value: Value,
    conn: &Arc<ActiveConnection>,
) -> Result<(Topic, Signal), serde_json::Error> {
    let routed = match msg_type {
        TYPE_ADD => {
            let message: AddMessage = serde_json::from_value(value)?;
            (
                Topic::Discovery,
                Signal::Add(Discovered::new(message, conn.clone())),
            )
        }
        TYPE_STATE => {
            let message: StateMessage = serde_json::from_value(value)?;
            (
                Topic::StateChanged(message.identity.clone()),
                Signal::State(Arc::new(message)),
            )
        }
        TYPE_CONFIG => {
            let message: ConfigMessage = serde_json::from_value(value)?;
            (
                Topic::ConfigChanged(message.identity.clone()),
                Signal::Config(Arc::new(message)),
            )
        }
        TYPE_AVAILABLE => {
            let message: AvailableMessage = serde_json::from_value(value)?;
            (
                Topic::AvailabilityChanged(message.identity.clone()),
                Signal::Available(Arc::new(message)),
            )
        }
        TYPE_EVENT => {
            let message: EventMessage = serde_json::from_value(value)?;
            (
                Topic::EventFired(message.identity.clone()),
                Signal::Event(Arc::new(message)),
            )
        }
        TYPE_REMOVE => {
            let message: RemoveMessage = serde_json::from_value(value)?;
            (Topic::Removal, Signal::Remove(Arc::new(message)))
        }
        other => {
            return Err(serde::de::Error::custom(format!("unknown command {other}")));
        }
    };
    Ok(routed)
}
