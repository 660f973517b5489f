//! Switch entities
//!
//! Switches are the only bidirectional kind: toggling one sends a
//! `state_changed` event back to the connection that discovered it. The
//! local state only changes once the remote side reports back.

use bridge_core::consts::SWITCH_ICON;
use bridge_core::{BridgeResult, EntityConfig, PlatformKind};
use serde_json::Value;

use super::binary_sensor::{on_off_state, parse_on_off};
use super::{DisplayAttributes, EntityKind};

#[derive(Debug)]
pub struct SwitchKind {
    state: Option<Value>,
}

impl SwitchKind {
    /// A switch discovered without a state starts out on
    pub fn new(initial: Option<&Value>) -> Self {
        Self {
            state: Some(initial.cloned().unwrap_or(Value::Bool(true))),
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        self.state.as_ref().and_then(parse_on_off)
    }
}

impl EntityKind for SwitchKind {
    fn platform(&self) -> PlatformKind {
        PlatformKind::Switch
    }

    fn apply_config(
        &mut self,
        _unique_id: &str,
        config: &EntityConfig,
        display: &mut DisplayAttributes,
    ) -> BridgeResult<()> {
        display.icon = Some(
            config
                .icon
                .clone()
                .unwrap_or_else(|| SWITCH_ICON.to_string()),
        );
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

    fn is_bidirectional(&self) -> bool {
        true
    }

    fn render_state(&self) -> String {
        on_off_state(self.is_on())
    }
}
