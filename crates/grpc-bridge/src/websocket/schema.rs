//! JSON schemas of the inbound bridge commands
//!
//! Every command carries `id`, `type` and the identity slugs. Unknown top-level
//! keys are rejected; the `config`, `device_info` and `attributes` blocks only
//! have their known keys typed.

use std::collections::HashMap;

use bridge_core::message::{
    TYPE_ADD, TYPE_AVAILABLE, TYPE_CONFIG, TYPE_EVENT, TYPE_REMOVE, TYPE_STATE,
};
use bridge_core::{BridgeError, BridgeResult};
use jsonschema::JSONSchema;
use serde_json::{json, Map, Value};

/// Compiled schemas by command type
pub struct CommandSchemas {
    schemas: HashMap<&'static str, JSONSchema>,
}

impl CommandSchemas {
    /// Compile the schema of every command
    pub fn compile() -> BridgeResult<Self> {
        let mut schemas = HashMap::new();
        for command in [
            TYPE_ADD,
            TYPE_STATE,
            TYPE_CONFIG,
            TYPE_AVAILABLE,
            TYPE_EVENT,
            TYPE_REMOVE,
        ] {
            let schema = command_schema(command);
            let compiled = JSONSchema::compile(&schema).map_err(|e| BridgeError::Schema {
                command: command.to_string(),
                reason: e.to_string(),
            })?;
            schemas.insert(command, compiled);
        }
        Ok(Self { schemas })
    }

    /// Whether `command` is a known command type
    pub fn contains(&self, command: &str) -> bool {
        self.schemas.contains_key(command)
    }

    /// Validate a frame against the schema of its command
    ///
    /// The error message names the first violated field.
    pub fn validate(&self, command: &str, instance: &Value) -> Result<(), String> {
        let Some(schema) = self.schemas.get(command) else {
            return Err(format!("unknown command {command}"));
        };
        if let Err(mut errors) = schema.validate(instance) {
            let message = match errors.next() {
                Some(error) => {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{path}: {error}")
                    }
                }
                None => "invalid message".to_string(),
            };
            return Err(message);
        }
        Ok(())
    }
}

fn string() -> Value {
    json!({"type": "string"})
}

/// A non-empty slug free of the separators joined into host ids
fn slug() -> Value {
    json!({"type": "string", "pattern": "^[^-:]+$"})
}

fn optional_string() -> Value {
    json!({"type": ["string", "null"]})
}

fn scalar_state() -> Value {
    json!({"type": ["boolean", "string", "number", "null"]})
}

fn object() -> Value {
    json!({"type": "object"})
}

fn string_list() -> Value {
    json!({"type": ["array", "null"], "items": {"type": "string"}})
}

fn entity_config() -> Value {
    json!({
        "type": "object",
        "properties": {
            "name": optional_string(),
            "icon": optional_string(),
            "device_class": optional_string(),
            "entity_category": optional_string(),
            "unit_of_measurement": optional_string(),
            "state_class": optional_string(),
            "options": string_list(),
            "event_types": string_list(),
        }
    })
}

fn device_info() -> Value {
    json!({
        "type": ["object", "null"],
        "properties": {
            "name": optional_string(),
            "manufacturer": optional_string(),
            "model": optional_string(),
            "sw_version": optional_string(),
            "hw_version": optional_string(),
            "suggested_area": optional_string(),
            "configuration_url": optional_string(),
        }
    })
}

/// Schema of one command: the common envelope plus its own fields
fn command_schema(command: &str) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "id".to_string(),
        json!({"type": "integer", "minimum": 1}),
    );
    properties.insert("type".to_string(), json!({"const": command}));
    properties.insert("service_slug".to_string(), slug());
    properties.insert("device_slug".to_string(), slug());
    properties.insert("entity_slug".to_string(), slug());

    let mut required = vec!["id", "type", "service_slug", "device_slug", "entity_slug"];

    match command {
        TYPE_ADD => {
            properties.insert("platform".to_string(), string());
            properties.insert("device_info".to_string(), device_info());
            properties.insert("config".to_string(), entity_config());
            properties.insert("remove".to_string(), json!({"type": "boolean"}));
            properties.insert("state".to_string(), scalar_state());
            properties.insert("attributes".to_string(), object());
            required.extend(["platform", "device_info", "config"]);
        }
        TYPE_STATE => {
            properties.insert("state".to_string(), scalar_state());
            properties.insert("attributes".to_string(), object());
        }
        TYPE_CONFIG => {
            properties.insert("config".to_string(), entity_config());
        }
        TYPE_AVAILABLE => {
            properties.insert(
                "available".to_string(),
                json!({"type": ["boolean", "null"]}),
            );
            required.push("available");
        }
        TYPE_EVENT => {
            properties.insert("event_type".to_string(), string());
            properties.insert("event_data".to_string(), object());
            required.push("event_type");
        }
        TYPE_REMOVE => {
            properties.insert("platform".to_string(), string());
            required.push("platform");
        }
        _ => {}
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn schemas() -> CommandSchemas {
        assert_ok!(CommandSchemas::compile())
    }

    fn add_frame() -> Value {
        json!({
            "id": 1,
            "type": TYPE_ADD,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "platform": "sensor",
            "device_info": {"name": "Device"},
            "config": {"name": "Entity"},
        })
    }

    #[test]
    fn test_all_commands_known() {
        let schemas = schemas();
        for command in [
            TYPE_ADD,
            TYPE_STATE,
            TYPE_CONFIG,
            TYPE_AVAILABLE,
            TYPE_EVENT,
            TYPE_REMOVE,
        ] {
            assert!(schemas.contains(command));
        }
        assert!(!schemas.contains("bridge/entity/unknown"));
    }

    #[test]
    fn test_valid_add() {
        assert_ok!(schemas().validate(TYPE_ADD, &add_frame()));
    }

    #[test]
    fn test_add_missing_platform_names_field() {
        let mut frame = add_frame();
        frame.as_object_mut().unwrap().remove("platform");
        let message = assert_err!(schemas().validate(TYPE_ADD, &frame));
        assert!(message.contains("platform"), "{message}");
    }

    #[test]
    fn test_add_mistyped_slug_names_field() {
        let mut frame = add_frame();
        frame["entity_slug"] = json!(5);
        let message = assert_err!(schemas().validate(TYPE_ADD, &frame));
        assert!(message.contains("entity_slug"), "{message}");
    }

    #[test]
    fn test_slug_with_separator_names_field() {
        let mut frame = add_frame();
        frame["device_slug"] = json!("b-c");
        let message = assert_err!(schemas().validate(TYPE_ADD, &frame));
        assert!(message.contains("device_slug"), "{message}");

        let mut frame = add_frame();
        frame["service_slug"] = json!("hub:1");
        assert_err!(schemas().validate(TYPE_ADD, &frame));

        let mut frame = add_frame();
        frame["entity_slug"] = json!("");
        assert_err!(schemas().validate(TYPE_ADD, &frame));
    }

    #[test]
    fn test_add_rejects_object_state() {
        let mut frame = add_frame();
        frame["state"] = json!({"nested": true});
        assert_err!(schemas().validate(TYPE_ADD, &frame));
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let mut frame = add_frame();
        frame["color"] = json!("red");
        assert_err!(schemas().validate(TYPE_ADD, &frame));
    }

    #[test]
    fn test_available_accepts_null() {
        let frame = json!({
            "id": 2,
            "type": TYPE_AVAILABLE,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "available": null,
        });
        assert_ok!(schemas().validate(TYPE_AVAILABLE, &frame));
    }

    #[test]
    fn test_available_rejects_string() {
        let frame = json!({
            "id": 2,
            "type": TYPE_AVAILABLE,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
            "available": "yes",
        });
        assert_err!(schemas().validate(TYPE_AVAILABLE, &frame));
    }

    #[test]
    fn test_event_requires_event_type() {
        let frame = json!({
            "id": 3,
            "type": TYPE_EVENT,
            "service_slug": "svc",
            "device_slug": "dev",
            "entity_slug": "ent",
        });
        let message = assert_err!(schemas().validate(TYPE_EVENT, &frame));
        assert!(message.contains("event_type"), "{message}");
    }
}
