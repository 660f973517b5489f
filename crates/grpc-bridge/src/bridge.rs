//! Integration lifecycle
//!
//! [`GrpcBridge`] owns the internal bus and the gateway for one config entry.
//! Setting the entry up creates the shared [`BridgeData`] and starts the
//! reconciler; unloading tears every live entity down again. The bus and the
//! gateway outlive reloads so that open connections keep working.

use std::sync::{Arc, Mutex};

use bridge_core::consts::{
    startup_message, DOMAIN, SERVICE_TURN_OFF, SERVICE_TURN_ON, VERSION,
};
use bridge_core::{BridgeError, BridgeResult, Identity, PlatformKind};
use bridge_host::{ConfigEntry, ConfigEntryState, Hass};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::data::BridgeData;
use crate::discovery::Reconciler;
use crate::entity::BridgeEntity;
use crate::topics::BridgeBus;
use crate::websocket::{ActiveConnection, Gateway};

/// Everything that exists only while the entry is loaded
#[derive(Clone)]
struct Loaded {
    data: Arc<BridgeData>,
    reconciler: Arc<Reconciler>,
}

/// The integration for one config entry
pub struct GrpcBridge {
    hass: Hass,
    entry: ConfigEntry,
    bus: Arc<BridgeBus>,
    gateway: Gateway,
    loaded: Mutex<Option<Loaded>>,
}

impl GrpcBridge {
    /// Build the bus and the gateway; nothing is subscribed until
    /// [`Self::setup_entry`]
    pub fn new(hass: Hass, entry: ConfigEntry) -> BridgeResult<Self> {
        let bus = Arc::new(BridgeBus::new());
        let gateway = Gateway::new(bus.clone())?;
        Ok(Self {
            hass,
            entry,
            bus,
            gateway,
            loaded: Mutex::new(None),
        })
    }

    pub fn hass(&self) -> &Hass {
        &self.hass
    }

    pub fn entry(&self) -> &ConfigEntry {
        &self.entry
    }

    pub fn bus(&self) -> &Arc<BridgeBus> {
        &self.bus
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Start accepting discovery messages
    ///
    /// Setting up an entry that is already loaded does nothing and returns
    /// false. Every other setup, including the one after an unload, logs the
    /// startup banner.
    pub fn setup_entry(&self) -> bool {
        let mut loaded = self.loaded.lock().unwrap_or_else(|e| e.into_inner());
        if loaded.is_some() {
            warn!(entry_id = %self.entry.entry_id, "Entry already set up");
            return false;
        }
        info!("{}", startup_message());

        let data = Arc::new(BridgeData::new(
            self.hass.clone(),
            self.entry.clone(),
            self.bus.clone(),
        ));
        let reconciler = Reconciler::new(data.clone());
        reconciler.start();
        *loaded = Some(Loaded { data, reconciler });
        drop(loaded);

        self.hass
            .config_entries
            .set_state(&self.entry.entry_id, ConfigEntryState::Loaded, None);
        self.hass
            .bus
            .fire(DOMAIN, json!({"type": "loaded", "version": VERSION}));
        info!(entry_id = %self.entry.entry_id, "Set up {DOMAIN}");
        true
    }

    /// Unload every platform and tear down the live entities
    ///
    /// Returns whether the entry is now unloaded. When the host refuses to
    /// unload a platform, everything stays in place.
    pub async fn unload_entry(&self) -> bool {
        let Some(loaded) = self.current() else {
            debug!(entry_id = %self.entry.entry_id, "Entry not loaded");
            return true;
        };

        let entries = &self.hass.config_entries;
        entries.set_state(
            &self.entry.entry_id,
            ConfigEntryState::UnloadInProgress,
            None,
        );
        if !loaded.reconciler.unload().await {
            entries.set_state(
                &self.entry.entry_id,
                ConfigEntryState::FailedUnload,
                Some("platform unload failed".to_string()),
            );
            return false;
        }

        self.loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        entries.set_state(&self.entry.entry_id, ConfigEntryState::NotLoaded, None);
        self.hass.bus.fire(DOMAIN, json!({"type": "unloaded"}));
        info!(entry_id = %self.entry.entry_id, "Unloaded {DOMAIN}");
        true
    }

    /// Unload, then set up again
    pub async fn reload_entry(&self) -> bool {
        self.unload_entry().await && self.setup_entry()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    /// Feed one text frame received on `conn` through the gateway
    pub async fn handle_text(&self, conn: &Arc<ActiveConnection>, text: &str) -> BridgeResult<()> {
        self.gateway.handle_text(conn, text).await
    }

    /// Run a service on one of the integration's entities
    ///
    /// Only switches have services: `turn_on` and `turn_off` send the command
    /// to the connection that declared the switch.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        entity_id: &str,
    ) -> BridgeResult<()> {
        let unknown = || BridgeError::UnknownService {
            domain: domain.to_string(),
            service: service.to_string(),
        };
        if !matches!(domain.parse(), Ok(PlatformKind::Switch)) {
            return Err(unknown());
        }
        let entity = self
            .data()
            .and_then(|data| data.entity_by_id(entity_id))
            .filter(|entity| entity.platform() == PlatformKind::Switch)
            .ok_or_else(|| BridgeError::EntityNotFound(entity_id.to_string()))?;

        debug!(entity_id, service, "Calling service");
        match service {
            SERVICE_TURN_ON => entity.turn_on().await,
            SERVICE_TURN_OFF => entity.turn_off().await,
            _ => Err(unknown()),
        }
    }

    /// Shared state of the loaded entry
    pub fn data(&self) -> Option<Arc<BridgeData>> {
        self.current().map(|loaded| loaded.data)
    }

    pub fn reconciler(&self) -> Option<Arc<Reconciler>> {
        self.current().map(|loaded| loaded.reconciler)
    }

    /// The live entity for an identity
    pub fn entity(&self, identity: &Identity) -> Option<Arc<BridgeEntity>> {
        self.current()?.data.entity(identity)
    }

    fn current(&self) -> Option<Loaded> {
        self.loaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl std::fmt::Debug for GrpcBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcBridge")
            .field("entry_id", &self.entry.entry_id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
