//! Topics and payloads of the integration's internal bus

use std::sync::Arc;

use bridge_core::{
    AddMessage, AvailableMessage, ConfigMessage, DiscoveryKey, EventMessage, Identity,
    PlatformKind, RemoveMessage, StateMessage,
};
use bridge_dispatcher::TopicBus;

use crate::websocket::ActiveConnection;

/// Address of a bus subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every inbound discovery message, consumed by the reconciler
    Discovery,
    /// Every inbound remove command, consumed by the reconciler
    Removal,
    /// A never-before-seen identity of this kind; consumed by its platform
    Added(PlatformKind),
    /// Discovery-level change for one live entity
    Updated(DiscoveryKey),
    ConfigChanged(Identity),
    AvailabilityChanged(Identity),
    StateChanged(Identity),
    EventFired(Identity),
}

/// What a discovery update asks of the live entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Reapply config and device info in place
    Update,
    /// Tear down; recreate under the newly declared kind afterwards
    Retype,
    /// Tear down for good
    Remove,
}

/// A discovery message and the connection it arrived on
#[derive(Debug, Clone)]
pub struct Discovered {
    pub message: Arc<AddMessage>,
    pub connection: Arc<ActiveConnection>,
}

impl Discovered {
    pub fn new(message: AddMessage, connection: Arc<ActiveConnection>) -> Self {
        Self {
            message: Arc::new(message),
            connection,
        }
    }
}

/// Payload carried on the bus
#[derive(Debug, Clone)]
pub enum Signal {
    /// On [`Topic::Discovery`] and [`Topic::Added`]
    Add(Discovered),
    /// On [`Topic::Updated`]
    Update(Discovered, Directive),
    /// On [`Topic::Updated`]; removal without a discovery message
    Teardown,
    Config(Arc<ConfigMessage>),
    Available(Arc<AvailableMessage>),
    State(Arc<StateMessage>),
    Event(Arc<EventMessage>),
    /// On [`Topic::Removal`]
    Remove(Arc<RemoveMessage>),
}

/// The bus connecting gateway, reconciler and entities
pub type BridgeBus = TopicBus<Topic, Signal>;
