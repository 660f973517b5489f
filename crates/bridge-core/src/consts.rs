//! Integration-wide constants

/// Integration domain, also the prefix of every unique id
pub const DOMAIN: &str = "grpc_bridge";

/// Human-readable integration name
pub const NAME: &str = "gRPC Bridge Companion";

/// Integration version reported in lifecycle events
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ISSUE_URL: &str = "https://github.com/moonen-home-automation/hass-bridge-companion/issues";

/// Default icon for switches without a configured icon
pub const SWITCH_ICON: &str = "mdi:electric-switch-closed";

// Wire keys
pub const CONF_ID: &str = "id";
pub const CONF_TYPE: &str = "type";
pub const CONF_SERVICE_SLUG: &str = "service_slug";
pub const CONF_DEVICE_SLUG: &str = "device_slug";
pub const CONF_ENTITY_SLUG: &str = "entity_slug";
pub const CONF_PLATFORM: &str = "platform";
pub const CONF_DEVICE_INFO: &str = "device_info";
pub const CONF_CONFIG: &str = "config";
pub const CONF_REMOVE: &str = "remove";
pub const CONF_STATE: &str = "state";
pub const CONF_ATTRIBUTES: &str = "attributes";
pub const CONF_AVAILABLE: &str = "available";
pub const CONF_EVENT_TYPE: &str = "event_type";
pub const CONF_EVENT_DATA: &str = "event_data";
pub const CONF_VERSION: &str = "version";

// Entity config keys
pub const CONF_NAME: &str = "name";
pub const CONF_ICON: &str = "icon";
pub const CONF_DEVICE_CLASS: &str = "device_class";
pub const CONF_ENTITY_CATEGORY: &str = "entity_category";
pub const CONF_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
pub const CONF_OPTIONS: &str = "options";
pub const CONF_LAST_RESET: &str = "last_reset";
pub const CONF_STATE_CLASS: &str = "state_class";
pub const CONF_EVENT_TYPES: &str = "event_types";

/// Event type sent back to a connection when a switch is toggled
pub const EVENT_STATE_CHANGED: &str = "state_changed";

// Switch services
pub const SERVICE_TURN_ON: &str = "turn_on";
pub const SERVICE_TURN_OFF: &str = "turn_off";

/// Banner logged whenever the integration is set up
pub fn startup_message() -> String {
    format!(
        "\n-------------------------------------------------------------------\n\
         {NAME}\n\
         Version: {VERSION}\n\
         This is a custom integration!\n\
         If you have any issues with this you need to open an issue here:\n\
         {ISSUE_URL}\n\
         -------------------------------------------------------------------"
    )
}
