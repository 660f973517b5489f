//! Event entities
//!
//! An event entity has no value of its own. Its state is the time of the
//! last trigger, and its attributes describe that trigger.

use std::collections::HashMap;

use bridge_core::{BridgeError, BridgeResult, EntityConfig, PlatformKind};
use bridge_host::STATE_UNKNOWN;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{DisplayAttributes, EntityKind};

/// The most recent trigger of an event entity
#[derive(Debug, Clone, PartialEq)]
pub struct LastEvent {
    pub event_type: String,
    pub data: Map<String, Value>,
    pub fired_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct EventKind {
    event_types: Vec<String>,
    last_event: Option<LastEvent>,
}

impl EventKind {
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }

    pub fn last_event(&self) -> Option<&LastEvent> {
        self.last_event.as_ref()
    }

    /// Record a trigger
    ///
    /// The type is not checked against the declared event types.
    pub fn trigger(&mut self, event_type: &str, data: Map<String, Value>) {
        self.last_event = Some(LastEvent {
            event_type: event_type.to_string(),
            data,
            fired_at: Utc::now(),
        });
    }
}

impl EntityKind for EventKind {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Event
    }

    fn apply_config(
        &mut self,
        unique_id: &str,
        config: &EntityConfig,
        _display: &mut DisplayAttributes,
    ) -> BridgeResult<()> {
        match &config.event_types {
            Some(types) if !types.is_empty() => {
                self.event_types = types.clone();
                Ok(())
            }
            _ => Err(BridgeError::MissingEventTypes(unique_id.to_string())),
        }
    }

    fn apply_state(
        &mut self,
        _unique_id: &str,
        _state: Option<&Value>,
        _display: &DisplayAttributes,
    ) {
    }

    fn render_state(&self) -> String {
        match &self.last_event {
            Some(event) => event
                .fired_at
                .to_rfc3339_opts(SecondsFormat::Millis, false),
            None => STATE_UNKNOWN.to_string(),
        }
    }

    fn render_attributes(&self, attributes: &mut HashMap<String, Value>) {
        attributes.insert(
            "event_types".to_string(),
            Value::from(self.event_types.clone()),
        );
        let event_type = match &self.last_event {
            Some(event) => {
                for (key, value) in &event.data {
                    attributes.insert(key.clone(), value.clone());
                }
                Value::from(event.event_type.as_str())
            }
            None => Value::Null,
        };
        attributes.insert("event_type".to_string(), event_type);
    }
}
