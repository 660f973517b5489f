//! Host event bus
//!
//! Carries `state_changed`, the integration's lifecycle events and the events
//! triggered by event entities. Each event type has its own broadcast channel,
//! created on first subscription; events of a type nobody listens to are
//! dropped.

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{Context, Event, EventType};

/// Events buffered per type before slow receivers start lagging
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
pub struct EventBus {
    channels: DashMap<EventType, broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event of `event_type` fired from now on
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> broadcast::Receiver<Event> {
        self.channels
            .entry(event_type.into())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Fire an event under a fresh context
    pub fn fire(&self, event_type: impl Into<EventType>, data: serde_json::Value) {
        self.fire_with_context(event_type, data, Context::new());
    }

    /// Fire an event caused by the change `context` names
    pub fn fire_with_context(
        &self,
        event_type: impl Into<EventType>,
        data: serde_json::Value,
        context: Context,
    ) {
        let event = Event::new(event_type, data, context);
        let Some(channel) = self.channels.get(&event.event_type) else {
            return;
        };
        // Only fails when every receiver is gone
        let delivered = channel.send(event.clone()).unwrap_or(0);
        debug!(event_type = %event.event_type, delivered, "Fired event");
    }

    /// Live receivers of `event_type`
    pub fn subscriber_count(&self, event_type: &EventType) -> usize {
        self.channels
            .get(event_type)
            .map(|channel| channel.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_lifecycle_event_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("grpc_bridge");

        bus.fire("grpc_bridge", json!({"type": "loaded"}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type.as_str(), "grpc_bridge");
        assert_eq!(event.data["type"], "loaded");
    }

    #[tokio::test]
    async fn test_context_is_carried() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("state_changed");
        let context = Context::new();

        bus.fire_with_context("state_changed", json!({}), context.clone());

        assert_eq!(rx.recv().await.unwrap().context, context);
    }

    #[tokio::test]
    async fn test_types_do_not_mix() {
        let bus = EventBus::new();
        let mut press = bus.subscribe("press");
        let mut release = bus.subscribe("release");

        bus.fire("press", json!({"button": 1}));

        assert_eq!(press.recv().await.unwrap().data["button"], 1);
        assert!(release.try_recv().is_err());
    }

    #[test]
    fn test_unheard_events_are_dropped() {
        let bus = EventBus::new();
        bus.fire("nobody_listens", json!({}));
        assert_eq!(bus.subscriber_count(&EventType::from("nobody_listens")), 0);

        let rx = bus.subscribe("press");
        assert_eq!(bus.subscriber_count(&EventType::from("press")), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(&EventType::from("press")), 0);
    }
}
