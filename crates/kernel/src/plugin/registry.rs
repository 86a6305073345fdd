//! The plugin registry: the authoritative record of every plugin's
//! lifecycle outcome and live command bindings.
//!
//! Entries are immutable once stored. All mutation is copy-and-swap of the
//! `Arc` behind a single lock, so command lookups and concurrent reloads
//! never observe a half-updated entry.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use cadre_sdk::PluginModule;

use super::error::PluginError;
use super::manifest::PluginManifest;

/// Lifecycle outcome of a plugin for the current load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Discovered,
    VersionRejected,
    PolicyDisabled,
    DependencyUnmet,
    Registered,
    Failed,
}

impl PluginStatus {
    /// Whether `self -> next` is a legal forward transition.
    ///
    /// A registered plugin may be re-registered (hot-reload swap) or fail;
    /// every other outcome is terminal for the load cycle.
    pub fn can_transition(self, next: PluginStatus) -> bool {
        match self {
            PluginStatus::Discovered => next != PluginStatus::Discovered,
            PluginStatus::Registered => {
                matches!(next, PluginStatus::Registered | PluginStatus::Failed)
            }
            _ => false,
        }
    }

    /// Stable lowercase label for diagnostics and listings.
    pub fn as_str(self) -> &'static str {
        match self {
            PluginStatus::Discovered => "discovered",
            PluginStatus::VersionRejected => "version-rejected",
            PluginStatus::PolicyDisabled => "policy-disabled",
            PluginStatus::DependencyUnmet => "dependency-unmet",
            PluginStatus::Registered => "registered",
            PluginStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authoritative record for one plugin.
pub struct RegistryEntry {
    /// Parsed metadata for this load cycle.
    pub manifest: PluginManifest,

    /// Absolute path of the manifest the plugin was loaded from.
    pub source: PathBuf,

    /// Manifest modification time at load.
    pub modified: SystemTime,

    /// Live module handle; present only while `Registered`.
    pub handle: Option<Arc<dyn PluginModule>>,

    /// Command identifiers owned by this plugin.
    pub command_ids: Vec<String>,

    /// Lifecycle outcome.
    pub status: PluginStatus,

    /// Reason for a non-registered outcome.
    pub error: Option<String>,

    /// When this entry was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl RegistryEntry {
    /// Entry for a plugin that reached registration.
    pub fn registered(
        manifest: PluginManifest,
        source: PathBuf,
        modified: SystemTime,
        handle: Arc<dyn PluginModule>,
        command_ids: Vec<String>,
    ) -> Self {
        Self {
            manifest,
            source,
            modified,
            handle: Some(handle),
            command_ids,
            status: PluginStatus::Registered,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// Entry for a plugin rejected or failed before going live.
    pub fn rejected(
        manifest: PluginManifest,
        source: PathBuf,
        modified: SystemTime,
        status: PluginStatus,
        error: &PluginError,
    ) -> Self {
        Self {
            manifest,
            source,
            modified,
            handle: None,
            command_ids: Vec::new(),
            status,
            error: Some(error.to_string()),
            recorded_at: Utc::now(),
        }
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.manifest.name)
            .field("status", &self.status)
            .field("command_ids", &self.command_ids)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Registry arena: plugin name to entry, behind one lock.
///
/// Uses `parking_lot::RwLock` rather than `std::sync::RwLock` because:
/// - No poisoning: a panic in a writer won't permanently wedge every reader.
/// - Shorter critical sections avoid blocking Tokio worker threads.
#[derive(Default)]
pub struct PluginRegistry {
    entries: parking_lot::RwLock<HashMap<String, Arc<RegistryEntry>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome for a plugin not seen before in this load cycle.
    pub fn record(&self, entry: RegistryEntry) -> Result<(), PluginError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&entry.manifest.name) {
            return Err(PluginError::DuplicateName {
                name: entry.manifest.name.clone(),
            });
        }
        entries.insert(entry.manifest.name.clone(), Arc::new(entry));
        Ok(())
    }

    /// Replace an existing entry (hot-reload swap).
    ///
    /// Enforces the forward-only transition rules; the replacement is a
    /// single pointer swap as far as readers are concerned.
    pub fn swap(&self, entry: RegistryEntry) -> Result<(), PluginError> {
        let mut entries = self.entries.write();
        let name = entry.manifest.name.clone();
        match entries.get(&name) {
            None => Err(PluginError::reload(&name, "not present in the registry")),
            Some(old) if !old.status.can_transition(entry.status) => Err(PluginError::reload(
                &name,
                format!("illegal transition {} -> {}", old.status, entry.status),
            )),
            Some(_) => {
                entries.insert(name, Arc::new(entry));
                Ok(())
            }
        }
    }

    /// Look up a plugin's entry.
    pub fn get(&self, name: &str) -> Option<Arc<RegistryEntry>> {
        self.entries.read().get(name).cloned()
    }

    /// All entries, sorted by plugin name.
    pub fn snapshot(&self) -> Vec<Arc<RegistryEntry>> {
        let mut entries: Vec<_> = self.entries.read().values().cloned().collect();
        entries.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
        entries
    }

    /// Number of entries with the given status.
    pub fn count_status(&self, status: PluginStatus) -> usize {
        self.entries
            .read()
            .values()
            .filter(|e| e.status == status)
            .count()
    }

    /// Remove an entry entirely (explicit unload). Returns whether it
    /// existed.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    /// Name of the plugin whose manifest lives at `source`.
    pub fn plugin_for_source(&self, source: &Path) -> Option<String> {
        self.entries
            .read()
            .values()
            .find(|e| e.source == source)
            .map(|e| e.manifest.name.clone())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
