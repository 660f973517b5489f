//! Identity of a remote object and the keys derived from it
//!
//! Slugs never contain [`SLUG_SEPARATORS`]; the gateway rejects them, which
//! keeps the joined unique id and device identifier distinct per triple.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consts::DOMAIN;

/// Characters used to join slugs into host-facing ids
pub const SLUG_SEPARATORS: [char; 2] = ['-', ':'];

/// The (service, device, entity) triple naming a remote object
///
/// Immutable for the lifetime of an entity; two live entities never share
/// the same triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub service_slug: String,
    pub device_slug: String,
    pub entity_slug: String,
}

impl Identity {
    pub fn new(
        service_slug: impl Into<String>,
        device_slug: impl Into<String>,
        entity_slug: impl Into<String>,
    ) -> Self {
        Self {
            service_slug: service_slug.into(),
            device_slug: device_slug.into(),
            entity_slug: entity_slug.into(),
        }
    }

    /// Unique id registered with the host entity registry
    ///
    /// Format: `grpc_bridge-<service>-<device>-<entity>`
    pub fn unique_id(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            DOMAIN, self.service_slug, self.device_slug, self.entity_slug
        )
    }

    /// Key indexing the discovery registry
    pub fn discovery_key(&self) -> DiscoveryKey {
        DiscoveryKey(self.clone())
    }

    /// Whether every slug is non-empty and free of [`SLUG_SEPARATORS`]
    pub fn is_valid(&self) -> bool {
        [&self.service_slug, &self.device_slug, &self.entity_slug]
            .iter()
            .all(|slug| !slug.is_empty() && !slug.contains(&SLUG_SEPARATORS[..]))
    }

    /// Device identifier (domain, id) for the device this object belongs to
    ///
    /// The id joins the service and device slugs with `:`.
    pub fn device_identifier(&self) -> (String, String) {
        (
            DOMAIN.to_string(),
            format!("{}:{}", self.service_slug, self.device_slug),
        )
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.service_slug, self.device_slug, self.entity_slug
        )
    }
}

/// Key of the discovery registry
///
/// Compares the whole triple, never a joined string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryKey(Identity);

impl DiscoveryKey {
    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

impl fmt::Display for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.unique_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_id_format() {
        let identity = Identity::new("hue", "bridge", "temperature");
        assert_eq!(identity.unique_id(), "grpc_bridge-hue-bridge-temperature");
    }

    #[test]
    fn test_discovery_key_wraps_identity() {
        let identity = Identity::new("hue", "bridge", "temperature");
        assert_eq!(identity.discovery_key().identity(), &identity);
        assert_eq!(
            identity.discovery_key().to_string(),
            "grpc_bridge-hue-bridge-temperature"
        );
    }

    #[test]
    fn test_keys_compare_by_triple() {
        let a = Identity::new("a-b", "c", "d");
        let b = Identity::new("a", "b-c", "d");
        assert_eq!(a.unique_id(), b.unique_id());
        assert_ne!(a.discovery_key(), b.discovery_key());
    }

    #[test]
    fn test_separators_make_identity_invalid() {
        assert!(Identity::new("svc", "dev", "ent_1").is_valid());
        assert!(!Identity::new("a-b", "c", "d").is_valid());
        assert!(!Identity::new("svc", "kitchen:1", "light").is_valid());
        assert!(!Identity::new("svc", "", "light").is_valid());
    }

    #[test]
    fn test_distinct_triples_have_distinct_keys() {
        let a = Identity::new("svc", "dev", "one");
        let b = Identity::new("svc", "dev", "two");
        assert_ne!(a.discovery_key(), b.discovery_key());
    }

    #[test]
    fn test_device_identifier() {
        let identity = Identity::new("svc", "kitchen", "light");
        assert_eq!(
            identity.device_identifier(),
            ("grpc_bridge".to_string(), "svc:kitchen".to_string())
        );
    }

    #[test]
    fn test_display() {
        let identity = Identity::new("svc", "dev", "ent");
        assert_eq!(identity.to_string(), "svc/dev/ent");
    }
}
