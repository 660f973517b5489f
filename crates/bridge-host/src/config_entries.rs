//! Config Entries
//!
//! Config entries represent integration instances. Besides their lifecycle
//! state, the manager owns platform forwarding: an integration asks the host
//! to set up (or unload) one of its entity platforms for an entry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Config entries errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Platform {platform} already set up for entry {entry_id}")]
    AlreadySetUp { entry_id: String, platform: String },

    #[error("Forwarding setup of {platform} failed: {reason}")]
    SetupFailed { platform: String, reason: String },

    #[error("Forwarding unload of {platform} failed: {reason}")]
    UnloadFailed { platform: String, reason: String },
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Hook consulted on every platform forward; an `Err` fails the forward
pub type ForwardHook = Arc<dyn Fn(&ConfigEntry, &str) -> Result<(), String> + Send + Sync>;

/// Config entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigEntryState {
    /// Initial state, not yet set up
    #[default]
    NotLoaded,
    /// Currently being configured
    SetupInProgress,
    /// Successfully set up
    Loaded,
    /// Setup failed
    SetupError,
    /// Currently unloading
    UnloadInProgress,
    /// Unload failed
    FailedUnload,
}

/// A configuration entry for an integration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique identifier (ULID)
    pub entry_id: String,

    /// Integration domain (e.g., "grpc_bridge")
    pub domain: String,

    /// Human-readable display name
    pub title: String,

    /// Configuration data
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,

    /// Current lifecycle state
    #[serde(skip, default)]
    pub state: ConfigEntryState,

    /// Human-readable explanation for failed states
    #[serde(skip, default)]
    pub reason: Option<String>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// Create a new config entry
    pub fn new(domain: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            entry_id: ulid::Ulid::new().to_string(),
            domain: domain.into(),
            title: title.into(),
            data: HashMap::new(),
            state: ConfigEntryState::NotLoaded,
            reason: None,
            created_at: Utc::now(),
        }
    }

    /// Set entry data
    pub fn with_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.data = data;
        self
    }

    /// Check if entry is loaded
    pub fn is_loaded(&self) -> bool {
        self.state == ConfigEntryState::Loaded
    }
}

/// Config Entries Manager
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Platforms currently forwarded, per entry
    forwarded: DashMap<String, HashSet<String>>,

    /// Number of successful setup forwards per platform
    forward_counts: DashMap<String, usize>,

    setup_hook: RwLock<Option<ForwardHook>>,
    unload_hook: RwLock<Option<ForwardHook>>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            forwarded: DashMap::new(),
            forward_counts: DashMap::new(),
            setup_hook: RwLock::new(None),
            unload_hook: RwLock::new(None),
        }
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntry {
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
        self.entries.insert(entry.entry_id.clone(), entry.clone());

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        entry
    }

    /// Remove an entry
    pub fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(entry_id);
        }
        self.forwarded.remove(entry_id);

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Set entry state
    pub fn set_state(&self, entry_id: &str, state: ConfigEntryState, reason: Option<String>) {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.state = state;
            entry.reason = reason;
            debug!("Entry {} state changed to {:?}", entry_id, state);
        }
    }

    /// Install the hook consulted by [`Self::forward_entry_setup`]
    pub fn set_setup_hook(&self, hook: ForwardHook) {
        if let Ok(mut slot) = self.setup_hook.write() {
            *slot = Some(hook);
        }
    }

    /// Install the hook consulted by [`Self::forward_entry_unload`]
    pub fn set_unload_hook(&self, hook: ForwardHook) {
        if let Ok(mut slot) = self.unload_hook.write() {
            *slot = Some(hook);
        }
    }

    fn run_hook(
        hook: &RwLock<Option<ForwardHook>>,
        entry: &ConfigEntry,
        platform: &str,
    ) -> Result<(), String> {
        let hook = hook.read().ok().and_then(|slot| slot.clone());
        match hook {
            Some(hook) => hook(entry, platform),
            None => Ok(()),
        }
    }

    /// Set up an entity platform for an entry
    ///
    /// Suspends before completing. Forwarding a platform that is already set
    /// up for the entry is an error.
    pub async fn forward_entry_setup(
        &self,
        entry: &ConfigEntry,
        platform: &str,
    ) -> ConfigEntriesResult<()> {
        tokio::task::yield_now().await;

        if self.is_forwarded(&entry.entry_id, platform) {
            warn!(entry_id = %entry.entry_id, platform, "Platform already set up");
            return Err(ConfigEntriesError::AlreadySetUp {
                entry_id: entry.entry_id.clone(),
                platform: platform.to_string(),
            });
        }

        Self::run_hook(&self.setup_hook, entry, platform).map_err(|reason| {
            warn!(entry_id = %entry.entry_id, platform, %reason, "Platform setup failed");
            ConfigEntriesError::SetupFailed {
                platform: platform.to_string(),
                reason,
            }
        })?;

        self.forwarded
            .entry(entry.entry_id.clone())
            .or_default()
            .insert(platform.to_string());
        *self.forward_counts.entry(platform.to_string()).or_default() += 1;

        info!(entry_id = %entry.entry_id, platform, "Set up platform");
        Ok(())
    }

    /// Unload an entity platform for an entry
    pub async fn forward_entry_unload(
        &self,
        entry: &ConfigEntry,
        platform: &str,
    ) -> ConfigEntriesResult<()> {
        tokio::task::yield_now().await;

        Self::run_hook(&self.unload_hook, entry, platform).map_err(|reason| {
            warn!(entry_id = %entry.entry_id, platform, %reason, "Platform unload failed");
            ConfigEntriesError::UnloadFailed {
                platform: platform.to_string(),
                reason,
            }
        })?;

        if let Some(mut platforms) = self.forwarded.get_mut(&entry.entry_id) {
            platforms.remove(platform);
        }

        info!(entry_id = %entry.entry_id, platform, "Unloaded platform");
        Ok(())
    }

    /// Whether a platform is currently set up for an entry
    pub fn is_forwarded(&self, entry_id: &str, platform: &str) -> bool {
        self.forwarded
            .get(entry_id)
            .map(|platforms| platforms.contains(platform))
            .unwrap_or(false)
    }

    /// How many times a platform has been set up, across all entries
    pub fn forward_count(&self, platform: &str) -> usize {
        self.forward_counts
            .get(platform)
            .map(|count| *count)
            .unwrap_or_default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_add_and_get_by_domain() {
        let manager = ConfigEntries::new();
        manager.add(ConfigEntry::new("grpc_bridge", "Bridge"));
        manager.add(ConfigEntry::new("other", "Other"));

        assert_eq!(manager.get_by_domain("grpc_bridge").len(), 1);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_set_state() {
        let manager = ConfigEntries::new();
        let entry = manager.add(ConfigEntry::new("grpc_bridge", "Bridge"));
        manager.set_state(&entry.entry_id, ConfigEntryState::Loaded, None);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_forward_setup_then_unload() {
        let manager = ConfigEntries::new();
        let entry = manager.add(ConfigEntry::new("grpc_bridge", "Bridge"));

        assert_ok!(manager.forward_entry_setup(&entry, "sensor").await);
        assert!(manager.is_forwarded(&entry.entry_id, "sensor"));
        assert_eq!(manager.forward_count("sensor"), 1);

        assert_ok!(manager.forward_entry_unload(&entry, "sensor").await);
        assert!(!manager.is_forwarded(&entry.entry_id, "sensor"));

        assert_ok!(manager.forward_entry_setup(&entry, "sensor").await);
        assert_eq!(manager.forward_count("sensor"), 2);
    }

    #[tokio::test]
    async fn test_double_forward_is_rejected() {
        let manager = ConfigEntries::new();
        let entry = manager.add(ConfigEntry::new("grpc_bridge", "Bridge"));

        assert_ok!(manager.forward_entry_setup(&entry, "switch").await);
        let err = assert_err!(manager.forward_entry_setup(&entry, "switch").await);
        assert!(matches!(err, ConfigEntriesError::AlreadySetUp { .. }));
        assert_eq!(manager.forward_count("switch"), 1);
    }

    #[tokio::test]
    async fn test_setup_hook_failure() {
        let manager = ConfigEntries::new();
        manager.set_setup_hook(Arc::new(|_entry, platform| {
            if platform == "event" {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }));
        let entry = manager.add(ConfigEntry::new("grpc_bridge", "Bridge"));

        let err = assert_err!(manager.forward_entry_setup(&entry, "event").await);
        assert_eq!(
            err,
            ConfigEntriesError::SetupFailed {
                platform: "event".to_string(),
                reason: "boom".to_string()
            }
        );
        assert!(!manager.is_forwarded(&entry.entry_id, "event"));
        assert_ok!(manager.forward_entry_setup(&entry, "sensor").await);
    }

    #[tokio::test]
    async fn test_unload_hook_failure_keeps_platform() {
        let manager = ConfigEntries::new();
        manager.set_unload_hook(Arc::new(|_entry, _platform| Err("busy".to_string())));
        let entry = manager.add(ConfigEntry::new("grpc_bridge", "Bridge"));

        assert_ok!(manager.forward_entry_setup(&entry, "sensor").await);
        assert_err!(manager.forward_entry_unload(&entry, "sensor").await);
        assert!(manager.is_forwarded(&entry.entry_id, "sensor"));
    }
}
