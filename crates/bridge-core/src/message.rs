//! Typed payloads of the six inbound bridge commands
//!
//! Each payload is deserialized from a frame that already passed schema
//! validation, so the structs here only describe shape. The request `id` is
//! kept on every payload; bidirectional entities address replies with it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Identity;

pub const TYPE_ADD: &str = "bridge/entity/add";
pub const TYPE_STATE: &str = "bridge/entity/state";
pub const TYPE_CONFIG: &str = "bridge/entity/config";
pub const TYPE_AVAILABLE: &str = "bridge/entity/available";
pub const TYPE_EVENT: &str = "bridge/entity/event";
pub const TYPE_REMOVE: &str = "bridge/entity/remove";

/// Device block attached to a discovery message
///
/// Presence of the block links the entity to a device; absence detaches it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,
}

/// Display configuration of an entity
///
/// Every field is optional; a config command only touches the fields it
/// carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<String>>,
}

/// `bridge/entity/add`: discovery of a new or changed entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddMessage {
    pub id: u64,
    #[serde(flatten)]
    pub identity: Identity,
    pub platform: String,
    /// `null` on the wire means "no device"
    #[serde(default)]
    pub device_info: Option<DeviceInfo>,
    pub config: EntityConfig,
    #[serde(default)]
    pub remove: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

/// `bridge/entity/state`: wholesale state replacement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub id: u64,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

/// `bridge/entity/config`: sparse config update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMessage {
    pub id: u64,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default)]
    pub config: Option<EntityConfig>,
}

/// `bridge/entity/available`: availability flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableMessage {
    pub id: u64,
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(default)]
    pub available: Option<bool>,
}

impl AvailableMessage {
    /// The effective flag; a missing value means available
    pub fn is_available(&self) -> bool {
        self.available.unwrap_or(true)
    }
}

/// `bridge/entity/event`: trigger on an event entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: u64,
    #[serde(flatten)]
    pub identity: Identity,
    pub event_type: String,
    #[serde(default)]
    pub event_data: Option<Map<String, Value>>,
}

/// `bridge/entity/remove`: delete an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveMessage {
    pub id: u64,
    #[serde(flatten)]
    pub identity: Identity,
    pub platform: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_message_defaults() {
        let msg: AddMessage = serde_json::from_value(json!({
            "id": 4,
            "type": TYPE_ADD,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "platform": "sensor",
            "device_info": {"name": "Kitchen"},
            "config": {"name": "Temperature", "unit_of_measurement": "°C"}
        }))
        .unwrap();

        assert_eq!(msg.identity, Identity::new("svc", "dev", "ent"));
        assert!(!msg.remove);
        assert!(msg.state.is_none());
        assert!(msg.attributes.is_none());
        assert_eq!(msg.config.name.as_deref(), Some("Temperature"));
        assert_eq!(
            msg.device_info.and_then(|d| d.name),
            Some("Kitchen".to_string())
        );
    }

    #[test]
    fn test_add_message_null_device_info() {
        let msg: AddMessage = serde_json::from_value(json!({
            "id": 1,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "platform": "switch",
            "device_info": null,
            "config": {}
        }))
        .unwrap();
        assert!(msg.device_info.is_none());
    }

    #[test]
    fn test_available_defaults_to_true() {
        let msg: AvailableMessage = serde_json::from_value(json!({
            "id": 2,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "available": null
        }))
        .unwrap();
        assert!(msg.is_available());
    }

    #[test]
    fn test_config_message_keeps_absent_fields_absent() {
        let msg: ConfigMessage = serde_json::from_value(json!({
            "id": 3,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "config": {"name": "X"}
        }))
        .unwrap();
        let config = msg.config.unwrap();
        assert_eq!(config.name.as_deref(), Some("X"));
        assert!(config.icon.is_none());
        assert!(config.options.is_none());
    }
}
