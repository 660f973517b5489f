//! State shared by the reconciler, the platforms and the live entities of
//! one loaded config entry

use std::sync::Arc;

use bridge_core::{DiscoveryKey, Identity, PlatformKind};
use bridge_host::{ConfigEntry, Hass};
use dashmap::DashMap;

use crate::discovery::DiscoveryRegistry;
use crate::entity::BridgeEntity;
use crate::topics::BridgeBus;

pub struct BridgeData {
    pub hass: Hass,
    pub entry: ConfigEntry,
    pub bus: Arc<BridgeBus>,
    /// Identity -> platform kind of every live or in-construction entity
    pub discovered: DiscoveryRegistry,
    /// Live entities by discovery key
    pub entities: DashMap<DiscoveryKey, Arc<BridgeEntity>>,
}

impl BridgeData {
    pub fn new(hass: Hass, entry: ConfigEntry, bus: Arc<BridgeBus>) -> Self {
        Self {
            hass,
            entry,
            bus,
            discovered: DiscoveryRegistry::new(),
            entities: DashMap::new(),
        }
    }

    /// The live entity for an identity
    pub fn entity(&self, identity: &Identity) -> Option<Arc<BridgeEntity>> {
        self.entities
            .get(&identity.discovery_key())
            .map(|e| e.value().clone())
    }

    /// The live entity registered under a host entity id
    pub fn entity_by_id(&self, entity_id: &str) -> Option<Arc<BridgeEntity>> {
        self.entities
            .iter()
            .find(|e| e.value().entity_id() == entity_id)
            .map(|e| e.value().clone())
    }

    /// Live entities of one kind
    pub fn entities_of(&self, platform: PlatformKind) -> Vec<Arc<BridgeEntity>> {
        self.entities
            .iter()
            .filter(|e| e.value().platform() == platform)
            .map(|e| e.value().clone())
            .collect()
    }
}
