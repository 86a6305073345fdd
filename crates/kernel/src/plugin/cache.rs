//! Optional discovery cache.
//!
//! Persists parsed manifests keyed by absolute path and last-modified time,
//! so scans over an unchanged tree skip TOML parsing. The cache is never
//! load-bearing: corruption, unreadability, or a version bump all degrade to
//! a full re-parse with a warning.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::manifest::PluginManifest;

/// Bumped whenever the on-disk layout changes; older files are discarded.
const CACHE_FORMAT: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    format: u32,
    entries: HashMap<PathBuf, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    modified: DateTime<Utc>,
    manifest: PluginManifest,
}

/// Fixed cache location outside any source tree.
pub fn default_cache_path() -> PathBuf {
    std::env::temp_dir().join("cadre").join("plugin-cache.json")
}

/// On-disk discovery cache.
#[derive(Debug)]
pub struct DiscoveryCache {
    path: PathBuf,
    entries: HashMap<PathBuf, CacheEntry>,
    dirty: bool,
}

impl DiscoveryCache {
    /// Load the cache at `path`, degrading to empty on any error.
    pub fn load(path: PathBuf) -> Self {
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) if file.format == CACHE_FORMAT => file.entries,
                Ok(file) => {
                    debug!(
                        path = %path.display(),
                        found = file.format,
                        expected = CACHE_FORMAT,
                        "discovery cache format changed, re-scanning"
                    );
                    HashMap::new()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discovery cache is corrupt, re-scanning");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discovery cache unreadable, re-scanning");
                HashMap::new()
            }
        };

        Self {
            path,
            entries,
            dirty: false,
        }
    }

    /// Cached manifest for `source`, provided its modification time matches.
    pub fn lookup(&self, source: &Path, modified: SystemTime) -> Option<PluginManifest> {
        let entry = self.entries.get(source)?;
        (entry.modified == DateTime::<Utc>::from(modified)).then(|| entry.manifest.clone())
    }

    /// Record a freshly parsed manifest.
    pub fn store(&mut self, source: &Path, modified: SystemTime, manifest: &PluginManifest) {
        self.entries.insert(
            source.to_path_buf(),
            CacheEntry {
                modified: modified.into(),
                manifest: manifest.clone(),
            },
        );
        self.dirty = true;
    }

    /// Drop entries whose paths are no longer on disk.
    pub fn retain_paths(&mut self, live: &HashSet<PathBuf>) {
        let before = self.entries.len();
        self.entries.retain(|path, _| live.contains(path));
        if self.entries.len() != before {
            self.dirty = true;
        }
    }

    /// Write the cache back if anything changed. Failures are logged, never
    /// fatal.
    pub fn persist(&mut self) {
        if !self.dirty {
            return;
        }
        let file = CacheFile {
            format: CACHE_FORMAT,
            entries: self.entries.clone(),
        };
        match write_cache_file(&self.path, &file) {
            Ok(()) => {
                self.dirty = false;
                debug!(
                    path = %self.path.display(),
                    entries = file.entries.len(),
                    "discovery cache persisted"
                );
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to persist discovery cache");
            }
        }
    }

    /// Number of cached manifests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn write_cache_file(path: &Path, file: &CacheFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(file)?;
    std::fs::write(path, json)?;
    Ok(())
}
