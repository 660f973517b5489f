//! Host services for the gRPC bridge integration
//!
//! In-memory renditions of the host pieces the integration projects into.
//!
//! # Key Types
//!
//! - [`EventBus`] - host events (`state_changed`, integration lifecycle)
//! - [`StateStore`] - rendered entity states
//! - [`EntityRegistry`] / [`DeviceRegistry`] - entity and device records
//! - [`ConfigEntries`] - config entries and platform forwarding
//! - [`Hass`] - the bundle handed to integrations

pub mod config_entries;
mod context;
pub mod device_registry;
pub mod entity_registry;
mod event;
pub mod event_bus;
mod state;
pub mod state_store;

use std::sync::Arc;

pub use config_entries::{
    ConfigEntries, ConfigEntriesError, ConfigEntriesResult, ConfigEntry, ConfigEntryState,
    ForwardHook,
};
pub use context::Context;
pub use device_registry::{DeviceEntry, DeviceIdentifier, DeviceRegistry};
pub use entity_registry::{EntityCategory, EntityEntry, EntityRegistry, EntityRegistryError};
pub use event::{Event, EventType, EVENT_STATE_CHANGED};
pub use event_bus::EventBus;
pub use state::{State, STATE_OFF, STATE_ON, STATE_UNAVAILABLE, STATE_UNKNOWN};
pub use state_store::StateStore;

/// The host services shared by every integration
#[derive(Clone)]
pub struct Hass {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateStore>,
    pub entity_registry: Arc<EntityRegistry>,
    pub device_registry: Arc<DeviceRegistry>,
    pub config_entries: Arc<ConfigEntries>,
}

impl Hass {
    /// Create a host with empty registries
    pub fn new() -> Self {
        let bus = Arc::new(EventBus::new());
        Self {
            states: Arc::new(StateStore::new(bus.clone())),
            bus,
            entity_registry: Arc::new(EntityRegistry::new()),
            device_registry: Arc::new(DeviceRegistry::new()),
            config_entries: Arc::new(ConfigEntries::new()),
        }
    }
}

impl Default for Hass {
    fn default() -> Self {
        Self::new()
    }
}
