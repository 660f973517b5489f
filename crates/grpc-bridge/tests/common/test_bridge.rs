//! Test bridge instance
//!
//! A host with one loaded `grpc_bridge` config entry, plus fake connections
//! whose outbound queue the test reads directly.

use std::sync::Arc;

use bridge_core::consts::DOMAIN;
use bridge_core::PlatformKind;
use bridge_host::{ConfigEntry, ForwardHook, Hass, State};
use grpc_bridge::{ActiveConnection, BridgeData, BridgeEntity, GrpcBridge, OutgoingMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use super::frames::identity;

pub struct TestBridge {
    pub bridge: GrpcBridge,
}

impl TestBridge {
    /// A loaded integration over an empty host
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A loaded integration whose host runs `hook` on every platform setup
    pub fn with_setup_hook(hook: ForwardHook) -> Self {
        Self::build(Some(hook))
    }

    fn build(hook: Option<ForwardHook>) -> Self {
        let hass = Hass::new();
        if let Some(hook) = hook {
            hass.config_entries.set_setup_hook(hook);
        }
        let entry = hass
            .config_entries
            .add(ConfigEntry::new(DOMAIN, "gRPC Bridge Companion"));
        let bridge = GrpcBridge::new(hass, entry).expect("schemas compile");
        bridge.setup_entry();
        Self { bridge }
    }

    pub fn hass(&self) -> &Hass {
        self.bridge.hass()
    }

    pub fn data(&self) -> Arc<BridgeData> {
        self.bridge.data().expect("entry loaded")
    }

    /// Open a fake connection
    pub fn connect(&self) -> TestConnection<'_> {
        let (conn, rx) = ActiveConnection::channel();
        TestConnection {
            bridge: &self.bridge,
            conn,
            rx,
            next_id: 1,
        }
    }

    /// The live entity of `svc/dev/<entity>`
    pub fn entity(&self, entity: &str) -> Option<Arc<BridgeEntity>> {
        self.bridge.entity(&identity(entity))
    }

    /// Entity id registered for `svc/dev/<entity>` under `platform`
    pub fn entity_id(&self, platform: PlatformKind, entity: &str) -> Option<String> {
        self.hass().entity_registry.get_entity_id(
            platform.as_str(),
            DOMAIN,
            &identity(entity).unique_id(),
        )
    }

    pub fn state(&self, entity_id: &str) -> Option<State> {
        self.hass().states.get(entity_id)
    }

    /// Assert that an entity is in a specific state
    pub fn assert_state(&self, entity_id: &str, expected: &str) {
        let state = self.hass().states.get_state(entity_id);
        assert_eq!(
            state.as_deref(),
            Some(expected),
            "Expected entity {} to be in state '{}', but was {:?}",
            entity_id,
            expected,
            state
        );
    }

    pub fn forward_count(&self, platform: PlatformKind) -> usize {
        self.hass().config_entries.forward_count(platform.as_str())
    }
}

/// One fake WebSocket connection
pub struct TestConnection<'a> {
    bridge: &'a GrpcBridge,
    pub conn: Arc<ActiveConnection>,
    rx: mpsc::Receiver<OutgoingMessage>,
    next_id: u64,
}

impl TestConnection<'_> {
    /// Send a frame under the next request id and return the reply
    pub async fn send(&mut self, mut frame: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        frame["id"] = Value::from(id);
        self.send_as_is(frame).await
    }

    /// Send a frame without touching its id and return the reply
    pub async fn send_as_is(&mut self, frame: Value) -> Value {
        self.send_text(&frame.to_string()).await
    }

    /// Send raw text and return the reply
    pub async fn send_text(&mut self, text: &str) -> Value {
        // Rejections are reported through the reply
        let _ = self.bridge.handle_text(&self.conn, text).await;
        self.recv().expect("every frame gets a reply")
    }

    /// Id the next [`Self::send`] will use
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Next queued outbound message, serialized as it goes on the wire
    pub fn recv(&mut self) -> Option<Value> {
        let msg = self.rx.try_recv().ok()?;
        Some(serde_json::to_value(msg).expect("outbound messages serialize"))
    }

    /// Drop the socket: run the lost-connection callbacks
    pub fn close(&self) {
        self.conn.close();
    }
}

/// Assert that a reply acknowledges request `id`
pub fn assert_ack(reply: &Value, id: u64) {
    assert_eq!(reply["id"], Value::from(id), "reply: {reply}");
    assert_eq!(reply["type"], "result", "reply: {reply}");
    assert_eq!(reply["success"], true, "reply: {reply}");
}

/// Assert that a reply is an error with `code`
pub fn assert_error(reply: &Value, code: &str) {
    assert_eq!(reply["success"], false, "reply: {reply}");
    assert_eq!(reply["error"]["code"], code, "reply: {reply}");
}
