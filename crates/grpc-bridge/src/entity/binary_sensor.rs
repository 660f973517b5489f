//! Binary sensor entities

use bridge_core::{BridgeResult, EntityConfig, PlatformKind};
use bridge_host::{STATE_OFF, STATE_ON, STATE_UNKNOWN};
use serde_json::Value;

use super::{DisplayAttributes, EntityKind};

/// Strings read as "on", compared after trimming and lowercasing
const ON_STATES: [&str; 8] = [
    "1", "true", "yes", "enable", "on", "open", "home", "unlocked",
];

/// Read a raw state as on/off
///
/// `None` means unknown.
pub fn parse_on_off(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        Value::Bool(on) => Some(*on),
        Value::Number(n) => Some(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => Some(ON_STATES.contains(&s.trim().to_lowercase().as_str())),
        _ => Some(false),
    }
}

/// Render an on/off reading as a host state
pub fn on_off_state(is_on: Option<bool>) -> String {
    match is_on {
        Some(true) => STATE_ON,
        Some(false) => STATE_OFF,
        None => STATE_UNKNOWN,
    }
    .to_string()
}

#[derive(Debug, Default)]
pub struct BinarySensorKind {
    state: Option<Value>,
}

impl BinarySensorKind {
    pub fn is_on(&self) -> Option<bool> {
        self.state.as_ref().and_then(parse_on_off)
    }
}

impl EntityKind for BinarySensorKind {
    fn platform(&self) -> PlatformKind {
        PlatformKind::BinarySensor
    }

    fn apply_config(
        &mut self,
        _unique_id: &str,
        _config: &EntityConfig,
        _display: &mut DisplayAttributes,
    ) -> BridgeResult<()> {
        Ok(())
    }

    fn apply_state(
        &mut self,
        _unique_id: &str,
        state: Option<&Value>,
        _display: &DisplayAttributes,
    ) {
        self.state = state.cloned();
    }

    fn render_state(&self) -> String {
        on_off_state(self.is_on())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_on_vocabulary() {
        for raw in [
            "1", "true", "TRUE", " yes ", "Enable", "on", "open", "home", "unlocked",
        ] {
            assert_eq!(parse_on_off(&json!(raw)), Some(true), "{raw}");
        }
    }

    #[test]
    fn test_other_strings_are_off() {
        for raw in ["0", "false", "off", "closed", "banana", ""] {
            assert_eq!(parse_on_off(&json!(raw)), Some(false), "{raw}");
        }
    }

    #[test]
    fn test_bool_number_and_null() {
        assert_eq!(parse_on_off(&json!(true)), Some(true));
        assert_eq!(parse_on_off(&json!(false)), Some(false));
        assert_eq!(parse_on_off(&json!(0)), Some(false));
        assert_eq!(parse_on_off(&json!(0.0)), Some(false));
        assert_eq!(parse_on_off(&json!(-3)), Some(true));
        assert_eq!(parse_on_off(&json!(0.5)), Some(true));
        assert_eq!(parse_on_off(&Value::Null), None);
    }

    #[test]
    fn test_render_state() {
        let mut sensor = BinarySensorKind::default();
        assert_eq!(sensor.render_state(), STATE_UNKNOWN);

        sensor.apply_state("id", Some(&json!("open")), &DisplayAttributes::default());
        assert_eq!(sensor.render_state(), STATE_ON);

        sensor.apply_state("id", Some(&json!(0)), &DisplayAttributes::default());
        assert_eq!(sensor.render_state(), STATE_OFF);

        sensor.apply_state("id", None, &DisplayAttributes::default());
        assert_eq!(sensor.is_on(), None);
    }
}
