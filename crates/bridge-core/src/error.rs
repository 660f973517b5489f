//! Error type shared by the bridge crates

use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the bridge integration
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Declared platform kind is outside the supported set
    #[error("platform {0} is not supported")]
    UnsupportedPlatform(String),

    /// Event entity declared without its allowed event types
    #[error("event entity {0} requires event_types in its config")]
    MissingEventTypes(String),

    /// The host refused to set up a platform
    #[error("setting up platform {platform} failed: {reason}")]
    PlatformSetup { platform: String, reason: String },

    /// The host refused to unload a platform
    #[error("unloading platform {platform} failed: {reason}")]
    PlatformUnload { platform: String, reason: String },

    /// Inbound message failed validation
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A command schema could not be compiled
    #[error("invalid command schema for {command}: {reason}")]
    Schema { command: String, reason: String },

    /// Command only bidirectional entities support
    #[error("entity {0} cannot send commands back to its connection")]
    NotBidirectional(String),

    /// No service of that name in that domain
    #[error("service {domain}.{service} not found")]
    UnknownService { domain: String, service: String },

    /// No live bridge entity with that entity id
    #[error("entity {0} not found")]
    EntityNotFound(String),

    /// The owning WebSocket connection is gone
    #[error("connection closed")]
    ConnectionClosed,
}
