//! Inbound frame builders
//!
//! Every frame names an entity of service `svc`, device `dev`. The harness
//! fills in the request id when the frame is sent.

use bridge_core::message::{
    TYPE_ADD, TYPE_AVAILABLE, TYPE_CONFIG, TYPE_EVENT, TYPE_REMOVE, TYPE_STATE,
};
use bridge_core::Identity;
use serde_json::{json, Value};

pub const SERVICE: &str = "svc";
pub const DEVICE: &str = "dev";

pub fn identity(entity: &str) -> Identity {
    Identity::new(SERVICE, DEVICE, entity)
}

fn envelope(command: &str, entity: &str) -> Value {
    json!({
        "type": command,
        "service_slug": SERVICE,
        "device_slug": DEVICE,
        "entity_slug": entity,
    })
}

/// Discovery message without device info or initial state
pub fn add(platform: &str, entity: &str, config: Value) -> Value {
    let mut frame = envelope(TYPE_ADD, entity);
    frame["platform"] = json!(platform);
    frame["device_info"] = Value::Null;
    frame["config"] = config;
    frame
}

/// Discovery message carrying an initial state
pub fn add_with_state(platform: &str, entity: &str, config: Value, state: Value) -> Value {
    let mut frame = add(platform, entity, config);
    frame["state"] = state;
    frame
}

/// Discovery message asking for removal
pub fn add_remove(platform: &str, entity: &str) -> Value {
    let mut frame = add(platform, entity, json!({}));
    frame["remove"] = json!(true);
    frame
}

pub fn state(entity: &str, state: Value, attributes: Option<Value>) -> Value {
    let mut frame = envelope(TYPE_STATE, entity);
    frame["state"] = state;
    if let Some(attributes) = attributes {
        frame["attributes"] = attributes;
    }
    frame
}

pub fn config(entity: &str, config: Value) -> Value {
    let mut frame = envelope(TYPE_CONFIG, entity);
    frame["config"] = config;
    frame
}

pub fn available(entity: &str, available: Value) -> Value {
    let mut frame = envelope(TYPE_AVAILABLE, entity);
    frame["available"] = available;
    frame
}

pub fn event(entity: &str, event_type: &str, data: Value) -> Value {
    let mut frame = envelope(TYPE_EVENT, entity);
    frame["event_type"] = json!(event_type);
    frame["event_data"] = data;
    frame
}

pub fn remove(platform: &str, entity: &str) -> Value {
    let mut frame = envelope(TYPE_REMOVE, entity);
    frame["platform"] = json!(platform);
    frame
}
