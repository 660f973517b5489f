//! Entity platforms
//!
//! Once the host has set up a platform kind for the config entry, an
//! [`EntityPlatform`] turns every "new entity of this kind" announcement into
//! a live [`BridgeEntity`].

use std::sync::{Arc, Weak};

use bridge_core::{BridgeResult, PlatformKind};
use bridge_dispatcher::Unsubscribe;
use tracing::{debug, error, info, warn};

use crate::data::BridgeData;
use crate::entity::BridgeEntity;
use crate::topics::{Discovered, Signal, Topic};

pub struct EntityPlatform {
    kind: PlatformKind,
    data: Arc<BridgeData>,
    subscription: Unsubscribe,
}

impl EntityPlatform {
    /// Start building entities announced on [`Topic::Added`] for `kind`
    pub fn setup(kind: PlatformKind, data: Arc<BridgeData>) -> Self {
        let weak: Weak<BridgeData> = Arc::downgrade(&data);
        let subscription = data.bus.subscribe(Topic::Added(kind), move |signal| {
            let data = weak.upgrade();
            async move {
                let (Some(data), Signal::Add(discovered)) = (data, signal) else {
                    return;
                };
                if let Err(e) = add_entity(kind, &data, &discovered) {
                    error!(
                        platform = %kind,
                        identity = %discovered.message.identity,
                        error = %e,
                        "Could not create entity"
                    );
                }
            }
        });
        info!(platform = %kind, "Platform ready");
        Self {
            kind,
            data,
            subscription,
        }
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    /// Stop creating entities and tear down every live entity of this kind
    pub async fn unload(&self) {
        self.subscription.cancel();
        let entities = self.data.entities_of(self.kind);
        debug!(platform = %self.kind, entities = entities.len(), "Unloading platform");
        for entity in entities {
            entity.remove().await;
        }
    }
}

/// Construct, index and activate the entity for a first-sight discovery
///
/// A construction failure forgets the identity so the next discovery
/// message starts over.
pub fn add_entity(
    kind: PlatformKind,
    data: &Arc<BridgeData>,
    discovered: &Discovered,
) -> BridgeResult<Option<Arc<BridgeEntity>>> {
    let key = discovered.message.identity.discovery_key();
    if data.entities.contains_key(&key) {
        warn!(identity = %discovered.message.identity, "Entity already exists");
        return Ok(None);
    }

    let entity = match BridgeEntity::new(kind, data.clone(), discovered) {
        Ok(entity) => entity,
        Err(e) => {
            data.discovered.remove(&key);
            return Err(e);
        }
    };
    data.entities.insert(key, entity.clone());
    entity.activate();
    Ok(Some(entity))
}
