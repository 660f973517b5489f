//! Device Registry
//!
//! Tracks registered devices with an index on their identifiers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A device identifier (domain, id) pair
///
/// Identifiers made of more than one id part are joined with `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    /// Build an identifier from several id parts
    pub fn from_parts(domain: impl Into<String>, parts: &[&str]) -> Self {
        Self(domain.into(), parts.join(":"))
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    /// Create a key for indexing
    pub fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// A registered device entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal id
    pub id: String,

    /// Unique identifiers by domain (e.g., [["grpc_bridge", "svc:dev"]])
    #[serde(default)]
    pub identifiers: Vec<DeviceIdentifier>,

    /// Associated config entries
    #[serde(default)]
    pub config_entries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Software/firmware version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,

    /// Hardware version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,

    /// Suggested area name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,

    /// URL for device configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modified timestamp
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    /// Create a new device entry with the current time
    pub fn new(name: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            identifiers: Vec::new(),
            config_entries: Vec::new(),
            name: name.map(|s| s.to_string()),
            manufacturer: None,
            model: None,
            sw_version: None,
            hw_version: None,
            suggested_area: None,
            configuration_url: None,
            created_at: now,
            modified_at: now,
        }
    }

    /// Name to show for the device
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Device Registry
///
/// Entries are stored as `Arc<DeviceEntry>` to avoid cloning on reads.
pub struct DeviceRegistry {
    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, Arc<DeviceEntry>>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,
}

impl DeviceRegistry {
    /// Create a new device registry
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            by_identifier: DashMap::new(),
        }
    }

    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();
        for identifier in &entry.identifiers {
            self.by_identifier
                .insert(identifier.key(), device_id.clone());
        }
        self.by_id.insert(device_id, entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }
        self.by_id.remove(&entry.id);
    }

    /// Get device by ID
    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    /// Get a device by any of its identifiers
    pub fn get_device(&self, identifiers: &[DeviceIdentifier]) -> Option<Arc<DeviceEntry>> {
        identifiers.iter().find_map(|identifier| {
            self.by_identifier
                .get(&identifier.key())
                .and_then(|device_id| self.get(&device_id))
        })
    }

    /// Get or create a device
    ///
    /// Looks up by identifiers first. A found device gains the config entry
    /// if it did not carry it yet.
    pub fn get_or_create(
        &self,
        identifiers: &[DeviceIdentifier],
        config_entry_id: Option<&str>,
        name: Option<&str>,
    ) -> Arc<DeviceEntry> {
        if let Some(existing) = self.get_device(identifiers) {
            debug!("Found existing device by identifier: {}", existing.id);
            let needs_entry = config_entry_id
                .map(|id| !existing.config_entries.iter().any(|e| e == id))
                .unwrap_or(false);
            if needs_entry {
                if let Some(updated) = self.update(&existing.id, |e| {
                    if let Some(id) = config_entry_id {
                        e.config_entries.push(id.to_string());
                    }
                }) {
                    return updated;
                }
            }
            return existing;
        }

        let mut entry = DeviceEntry::new(name);
        entry.identifiers = identifiers.to_vec();
        if let Some(config_id) = config_entry_id {
            entry.config_entries.push(config_id.to_string());
        }

        let arc_entry = Arc::new(entry);
        self.index_entry(Arc::clone(&arc_entry));

        info!("Registered new device: {:?} ({})", name, arc_entry.id);
        arc_entry
    }

    /// Update a device entry
    pub fn update<F>(&self, device_id: &str, f: F) -> Option<Arc<DeviceEntry>>
    where
        F: FnOnce(&mut DeviceEntry),
    {
        let (_, old) = self.by_id.remove(device_id)?;
        for identifier in &old.identifiers {
            self.by_identifier.remove(&identifier.key());
        }

        let mut entry = (*old).clone();
        f(&mut entry);
        entry.modified_at = Utc::now();

        let new_arc = Arc::new(entry);
        self.index_entry(Arc::clone(&new_arc));
        Some(new_arc)
    }

    /// Remove a device
    pub fn remove(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        let arc_entry = self.get(device_id)?;
        self.unindex_entry(&arc_entry);
        info!("Removed device: {}", device_id);
        Some(arc_entry)
    }

    /// Get count of registered devices
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
