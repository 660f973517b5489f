//! Discovery reconciliation
//!
//! The [`Reconciler`] decides, for every discovery message, whether the
//! identity is new, unchanged, retyped or being removed. It owns the
//! [`DiscoveryRegistry`] (shared with the entities, which forget themselves on
//! removal) and the set of platforms already set up with the host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bridge_core::consts::DOMAIN;
use bridge_core::{BridgeError, BridgeResult, DiscoveryKey, PlatformKind, RemoveMessage};
use bridge_dispatcher::Unsubscribe;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};

use crate::data::BridgeData;
use crate::platform::EntityPlatform;
use crate::topics::{Directive, Discovered, Signal, Topic};

/// Discovery key -> platform kind of every live or in-construction entity
#[derive(Debug, Default)]
pub struct DiscoveryRegistry {
    entries: DashMap<DiscoveryKey, PlatformKind>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DiscoveryKey) -> Option<PlatformKind> {
        self.entries.get(key).map(|kind| *kind)
    }

    /// Record the kind of an identity, returning the previous one
    pub fn insert(&self, key: DiscoveryKey, kind: PlatformKind) -> Option<PlatformKind> {
        self.entries.insert(key, kind)
    }

    /// Forget an identity; forgetting an unknown key is a no-op
    pub fn remove(&self, key: &DiscoveryKey) -> Option<PlatformKind> {
        self.entries.remove(key).map(|(_, kind)| kind)
    }

    pub fn contains(&self, key: &DiscoveryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies discovery messages
pub struct Reconciler {
    data: Arc<BridgeData>,
    /// Platforms set up with the host; the lock spans the host setup call
    platforms: tokio::sync::Mutex<HashMap<PlatformKind, EntityPlatform>>,
    subscriptions: Mutex<Vec<Unsubscribe>>,
}

impl Reconciler {
    pub fn new(data: Arc<BridgeData>) -> Arc<Self> {
        Arc::new(Self {
            data,
            platforms: tokio::sync::Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    pub fn data(&self) -> &Arc<BridgeData> {
        &self.data
    }

    /// Listen for discovery messages and remove commands
    pub fn start(self: &Arc<Self>) {
        let bus = &self.data.bus;

        let weak = Arc::downgrade(self);
        let discovery = bus.subscribe(Topic::Discovery, move |signal| {
            let reconciler = weak.upgrade();
            async move {
                let (Some(reconciler), Signal::Add(discovered)) = (reconciler, signal) else {
                    return;
                };
                if let Err(e) = reconciler.handle_add(discovered).await {
                    error!(error = %e, "Discovery failed");
                }
            }
        });

        let weak = Arc::downgrade(self);
        let removal = bus.subscribe(Topic::Removal, move |signal| {
            let reconciler = weak.upgrade();
            async move {
                if let (Some(reconciler), Signal::Remove(msg)) = (reconciler, signal) {
                    reconciler.handle_remove(&msg).await;
                }
            }
        });

        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend([discovery, removal]);
        info!("Discovery started");
    }

    /// Stop listening for discovery messages and remove commands
    pub fn stop(&self) {
        let subscriptions =
            std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(|e| e.into_inner()));
        for subscription in subscriptions {
            subscription.cancel();
        }
        info!("Discovery stopped");
    }

    /// Apply one discovery message
    ///
    /// A first sight sets up the platform if needed and announces the new
    /// entity; a known identity gets an update, retype or remove directive on
    /// its own topic. Unsupported platforms are ignored.
    #[instrument(skip_all, fields(identity = %discovered.message.identity))]
    pub async fn handle_add(&self, discovered: Discovered) -> BridgeResult<()> {
        let message = discovered.message.clone();
        debug!(message = ?message, "Discovery message");

        let kind = match message.platform.parse::<PlatformKind>() {
            Ok(kind) => kind,
            Err(_) => {
                warn!(platform = %message.platform, "Platform not supported, ignoring");
                return Ok(());
            }
        };
        let key = message.identity.discovery_key();

        let Some(current) = self.data.discovered.get(&key) else {
            if message.remove {
                debug!("Remove requested for an unknown identity, ignoring");
                return Ok(());
            }
            info!("Creating {kind} {}", message.identity);
            self.data.discovered.insert(key.clone(), kind);
            if let Err(e) = self.ensure_platform(kind).await {
                self.data.discovered.remove(&key);
                return Err(e);
            }
            self.data
                .bus
                .publish(&Topic::Added(kind), Signal::Add(discovered))
                .await;
            return Ok(());
        };

        let directive = if current != kind {
            info!("Changing {current} to {kind} for {}", message.identity);
            Directive::Retype
        } else if message.remove {
            info!("Removing {kind} {}", message.identity);
            Directive::Remove
        } else {
            info!("Updating {kind} {}", message.identity);
            Directive::Update
        };
        self.data.discovered.insert(key.clone(), kind);
        self.data
            .bus
            .publish(&Topic::Updated(key), Signal::Update(discovered, directive))
            .await;
        Ok(())
    }

    /// Set up `kind` with the host unless already done
    ///
    /// Concurrent callers for the same kind wait on the lock, so the host
    /// sees exactly one setup per kind.
    async fn ensure_platform(&self, kind: PlatformKind) -> BridgeResult<()> {
        let mut platforms = self.platforms.lock().await;
        if platforms.contains_key(&kind) {
            return Ok(());
        }

        self.data
            .hass
            .config_entries
            .forward_entry_setup(&self.data.entry, kind.as_str())
            .await
            .map_err(|e| BridgeError::PlatformSetup {
                platform: kind.to_string(),
                reason: e.to_string(),
            })?;

        platforms.insert(kind, EntityPlatform::setup(kind, self.data.clone()));
        Ok(())
    }

    /// Apply a remove command
    ///
    /// A live entity is torn down whatever platform the command names.
    /// Otherwise a leftover registry entry of the named platform is removed;
    /// with none, the command does nothing.
    #[instrument(skip_all, fields(identity = %msg.identity))]
    pub async fn handle_remove(&self, msg: &RemoveMessage) {
        let kind = match msg.platform.parse::<PlatformKind>() {
            Ok(kind) => kind,
            Err(_) => {
                warn!(platform = %msg.platform, "Platform not supported, ignoring remove");
                return;
            }
        };

        let key = msg.identity.discovery_key();
        let live = self.data.entities.get(&key).map(|e| e.value().platform());
        if let Some(current) = live {
            if current != kind {
                debug!(
                    requested = %kind,
                    current = %current,
                    "Remove names another platform, removing the live entity anyway"
                );
            }
            info!("Removing {current} {} on request", msg.identity);
            self.data
                .bus
                .publish(&Topic::Updated(key), Signal::Teardown)
                .await;
            return;
        }

        let registry = &self.data.hass.entity_registry;
        match registry.get_entity_id(kind.as_str(), DOMAIN, &msg.identity.unique_id()) {
            Some(entity_id) => {
                registry.remove(&entity_id);
                info!(entity_id = %entity_id, "Removed registry entry");
            }
            None => warn!("No {kind} registry entry for {}, nothing to remove", msg.identity),
        }
    }

    /// Platform kinds set up so far
    pub async fn platforms(&self) -> Vec<PlatformKind> {
        let mut kinds: Vec<PlatformKind> = self.platforms.lock().await.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Unload every platform set up so far
    ///
    /// Only when the host unloads all of them are the platforms' entities
    /// torn down and discovery stopped. Returns whether that happened.
    pub async fn unload(&self) -> bool {
        let kinds = self.platforms().await;
        let results = join_all(kinds.iter().map(|kind| {
            self.data
                .hass
                .config_entries
                .forward_entry_unload(&self.data.entry, kind.as_str())
        }))
        .await;

        let mut unloaded = true;
        for (kind, result) in kinds.iter().zip(results) {
            if let Err(e) = result {
                error!(platform = %kind, error = %e, "Could not unload platform");
                unloaded = false;
            }
        }
        if !unloaded {
            return false;
        }

        self.stop();
        let platforms: Vec<EntityPlatform> = self
            .platforms
            .lock()
            .await
            .drain()
            .map(|(_, platform)| platform)
            .collect();
        for platform in platforms {
            platform.unload().await;
        }
        true
    }
}
