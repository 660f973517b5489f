//! Platform kinds and entity categories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::BridgeError;

/// The closed set of platform kinds the bridge can project entities into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Sensor,
    BinarySensor,
    Switch,
    Event,
}

impl PlatformKind {
    pub const ALL: [PlatformKind; 4] = [
        PlatformKind::Switch,
        PlatformKind::Sensor,
        PlatformKind::Event,
        PlatformKind::BinarySensor,
    ];

    /// The host domain for this kind (e.g. "binary_sensor")
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Sensor => "sensor",
            PlatformKind::BinarySensor => "binary_sensor",
            PlatformKind::Switch => "switch",
            PlatformKind::Event => "event",
        }
    }

    /// Whether entities of this kind carry a state value and extra attributes
    pub fn is_stateful(&self) -> bool {
        !matches!(self, PlatformKind::Event)
    }
}

impl FromStr for PlatformKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor" => Ok(PlatformKind::Sensor),
            "binary_sensor" => Ok(PlatformKind::BinarySensor),
            "switch" => Ok(PlatformKind::Switch),
            "event" => Ok(PlatformKind::Event),
            other => Err(BridgeError::UnsupportedPlatform(other.to_string())),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity category recognized by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    /// Configuration entity
    Config,
    /// Diagnostic entity
    Diagnostic,
}

impl EntityCategory {
    /// Map a declared category string; anything unrecognized means no category
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "config" => Some(EntityCategory::Config),
            "diagnostic" => Some(EntityCategory::Diagnostic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::Config => "config",
            EntityCategory::Diagnostic => "diagnostic",
        }
    }
}
