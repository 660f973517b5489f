//! Core types for the gRPC bridge integration
//!
//! This crate provides the fundamental types shared by the bridge crates:
//! the identity triple of a remote object and the keys derived from it,
//! the closed set of supported platform kinds, the inbound wire payloads,
//! and the integration-wide constants.

pub mod consts;
mod error;
mod identity;
pub mod message;
mod platform;

pub use error::{BridgeError, BridgeResult};
pub use identity::{DiscoveryKey, Identity, SLUG_SEPARATORS};
pub use message::{
    AddMessage, AvailableMessage, ConfigMessage, DeviceInfo, EntityConfig, EventMessage,
    RemoveMessage, StateMessage,
};
pub use platform::{EntityCategory, PlatformKind};
