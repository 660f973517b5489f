//! gRPC bridge companion integration
//!
//! Remote services connect over WebSocket and declare entities with
//! discovery messages. The integration validates every inbound command,
//! routes it over an internal topic bus, and projects the declared entities
//! into the host's state machine and registries.
//!
//! # Architecture
//!
//! - [`websocket`] - connections, command schemas and the [`Gateway`]
//! - [`discovery`] - the [`Reconciler`] deciding create / update / retype / remove
//! - [`platform`] - per-kind entity construction once a platform is set up
//! - [`entity`] - live entities and their kind-specific behavior
//! - [`bridge`] - the config entry lifecycle ([`GrpcBridge`])

pub mod bridge;
pub mod data;
pub mod discovery;
pub mod entity;
pub mod platform;
pub mod topics;
pub mod websocket;

pub use bridge::GrpcBridge;
pub use data::BridgeData;
pub use discovery::{DiscoveryRegistry, Reconciler};
pub use entity::{BridgeEntity, DisplayAttributes, EntityKind, KindState};
pub use platform::EntityPlatform;
pub use topics::{BridgeBus, Directive, Discovered, Signal, Topic};
pub use websocket::{ActiveConnection, Gateway, OutgoingMessage};
