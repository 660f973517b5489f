//! Sensor entities
//!
//! A sensor carries a scalar value, or a parsed date-time when its device
//! class is `timestamp` or `date`.

use std::collections::HashMap;

use bridge_core::{BridgeResult, EntityCategory, EntityConfig, PlatformKind};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{error, warn};

use super::{display_value, DisplayAttributes, EntityKind};
use bridge_host::STATE_UNKNOWN;

pub const DEVICE_CLASS_TIMESTAMP: &str = "timestamp";
pub const DEVICE_CLASS_DATE: &str = "date";

/// Native value of a sensor
#[derive(Debug, Clone, PartialEq)]
pub enum SensorValue {
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Raw(Value),
}

#[derive(Debug, Default)]
pub struct SensorKind {
    native_value: Option<SensorValue>,
    native_unit: Option<String>,
    state_class: Option<String>,
    last_reset: Option<DateTime<Utc>>,
}

impl SensorKind {
    pub fn native_value(&self) -> Option<&SensorValue> {
        self.native_value.as_ref()
    }

    pub fn native_unit(&self) -> Option<&str> {
        self.native_unit.as_deref()
    }

    pub fn last_reset(&self) -> Option<DateTime<Utc>> {
        self.last_reset
    }
}

impl EntityKind for SensorKind {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Sensor
    }

    fn apply_config(
        &mut self,
        unique_id: &str,
        config: &EntityConfig,
        display: &mut DisplayAttributes,
    ) -> BridgeResult<()> {
        // Sensors report their unit as the native unit
        self.native_unit = display.unit_of_measurement.take();
        self.state_class = config.state_class.clone();
        self.last_reset = config
            .last_reset
            .as_ref()
            .and_then(|raw| parse_last_reset(unique_id, raw));
        Ok(())
    }

    fn apply_state(
        &mut self,
        unique_id: &str,
        state: Option<&Value>,
        display: &DisplayAttributes,
    ) {
        self.native_value = convert_state(unique_id, state, display.device_class.as_deref());
    }

    fn category_for(&self, raw: &str) -> Option<EntityCategory> {
        match EntityCategory::parse(raw) {
            Some(EntityCategory::Config) => {
                warn!("Sensor entities cannot use the config entity category, ignoring it");
                None
            }
            other => other,
        }
    }

    fn render_state(&self) -> String {
        match &self.native_value {
            None => STATE_UNKNOWN.to_string(),
            Some(SensorValue::Timestamp(at)) => at.to_rfc3339_opts(SecondsFormat::Secs, false),
            Some(SensorValue::Date(date)) => date.format("%Y-%m-%d").to_string(),
            Some(SensorValue::Raw(value)) => display_value(value),
        }
    }

    fn render_attributes(&self, attributes: &mut HashMap<String, Value>) {
        if let Some(unit) = &self.native_unit {
            attributes.insert("unit_of_measurement".to_string(), Value::from(unit.as_str()));
        }
        if let Some(state_class) = &self.state_class {
            attributes.insert("state_class".to_string(), Value::from(state_class.as_str()));
        }
        if let Some(last_reset) = self.last_reset {
            attributes.insert(
                "last_reset".to_string(),
                Value::from(last_reset.to_rfc3339_opts(SecondsFormat::Secs, false)),
            );
        }
    }
}

/// Convert a raw state into the sensor's native value
///
/// Timestamp and date sensors parse the state; anything unparsable becomes
/// absent.
fn convert_state(
    unique_id: &str,
    state: Option<&Value>,
    device_class: Option<&str>,
) -> Option<SensorValue> {
    let state = state.filter(|v| !v.is_null())?;
    match device_class {
        Some(class @ (DEVICE_CLASS_TIMESTAMP | DEVICE_CLASS_DATE)) => {
            let raw = state.as_str();
            let parsed = if class == DEVICE_CLASS_DATE {
                raw.and_then(parse_date).map(SensorValue::Date)
            } else {
                raw.and_then(parse_datetime).map(SensorValue::Timestamp)
            };
            if parsed.is_none() {
                error!(
                    unique_id,
                    device_class = class,
                    state = %state,
                    "Could not parse state as a date-time"
                );
            }
            parsed
        }
        _ => Some(SensorValue::Raw(state.clone())),
    }
}

fn parse_last_reset(unique_id: &str, raw: &Value) -> Option<DateTime<Utc>> {
    if raw.is_null() {
        return None;
    }
    let parsed = raw.as_str().and_then(parse_datetime);
    if parsed.is_none() {
        error!(unique_id, value = %raw, "Invalid ISO date string for last_reset");
    }
    parsed
}

/// Parse an ISO 8601 date-time or date
///
/// Values without an offset are taken as UTC; a bare date means midnight.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    parse_with_offset(raw).map(|at| at.with_timezone(&Utc))
}

/// Calendar day of an ISO 8601 date or date-time, in the value's own offset
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_with_offset(raw).map(|at| at.date_naive())
}

fn parse_with_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at);
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Some(at);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().into());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn timestamp_display() -> DisplayAttributes {
        DisplayAttributes {
            device_class: Some(DEVICE_CLASS_TIMESTAMP.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_datetime_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_datetime("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-01T12:30:00.000"), Some(expected));
        assert_eq!(
            parse_datetime("2024-03-01"),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_plain_state_kept_raw() {
        let mut sensor = SensorKind::default();
        sensor.apply_state("id", Some(&json!(21.5)), &DisplayAttributes::default());
        assert_eq!(sensor.native_value(), Some(&SensorValue::Raw(json!(21.5))));
        assert_eq!(sensor.render_state(), "21.5");
    }

    #[test]
    fn test_timestamp_state_parsed() {
        let mut sensor = SensorKind::default();
        sensor.apply_state("id", Some(&json!("2024-03-01T12:30:00Z")), &timestamp_display());
        assert_eq!(sensor.render_state(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn test_unparsable_timestamp_becomes_absent() {
        let mut sensor = SensorKind::default();
        sensor.apply_state("id", Some(&json!("2024-03-01T12:30:00Z")), &timestamp_display());
        sensor.apply_state("id", Some(&json!("not a date")), &timestamp_display());
        assert_eq!(sensor.native_value(), None);
        assert_eq!(sensor.render_state(), STATE_UNKNOWN);
    }

    #[test]
    fn test_date_renders_day_only() {
        let display = DisplayAttributes {
            device_class: Some(DEVICE_CLASS_DATE.to_string()),
            ..Default::default()
        };
        let mut sensor = SensorKind::default();
        sensor.apply_state("id", Some(&json!("2024-03-01T23:00:00Z")), &display);
        assert_eq!(sensor.render_state(), "2024-03-01");
    }

    #[test]
    fn test_date_keeps_the_local_day() {
        assert_eq!(
            parse_date("2024-03-01T01:00:00+02:00"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            parse_date("2024-02-29T23:30:00-05:00"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_date("2024-03-01"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn test_unit_moves_to_native_unit() {
        let mut display = DisplayAttributes {
            unit_of_measurement: Some("°C".to_string()),
            ..Default::default()
        };
        let config = EntityConfig {
            state_class: Some("measurement".to_string()),
            last_reset: Some(json!("garbage")),
            ..Default::default()
        };
        let mut sensor = SensorKind::default();
        sensor.apply_config("id", &config, &mut display).unwrap();

        assert_eq!(display.unit_of_measurement, None);
        assert_eq!(sensor.native_unit(), Some("°C"));
        assert_eq!(sensor.last_reset(), None);

        let mut attributes = HashMap::new();
        sensor.render_attributes(&mut attributes);
        assert_eq!(attributes["unit_of_measurement"], json!("°C"));
        assert_eq!(attributes["state_class"], json!("measurement"));
        assert!(!attributes.contains_key("last_reset"));
    }

    #[test]
    fn test_config_category_dropped() {
        let sensor = SensorKind::default();
        assert_eq!(sensor.category_for("config"), None);
        assert_eq!(
            sensor.category_for("diagnostic"),
            Some(EntityCategory::Diagnostic)
        );
    }
}
