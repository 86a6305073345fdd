//! Plugin discovery by file-name convention.
//!
//! Walks the ordered search paths looking for `plugin_<identifier>.toml`
//! manifests. Identifiers are deduplicated across paths with the first
//! occurrence winning, so a later search path can never shadow an earlier
//! one. Unreadable directories are reported per path and never abort the
//! scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::error::PluginError;

/// Fixed file-name prefix that marks a plugin manifest.
pub const MANIFEST_PREFIX: &str = "plugin_";

/// Manifest file extension.
pub const MANIFEST_EXTENSION: &str = "toml";

/// A manifest file matched by naming convention, not yet validated.
#[derive(Debug, Clone)]
pub struct PluginCandidate {
    /// Identifier derived from the file name with the prefix stripped.
    pub identifier: String,

    /// Absolute path to the manifest file.
    pub source: PathBuf,

    /// Last-modified time of the manifest file.
    pub modified: SystemTime,
}

/// Result of scanning the search paths.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Candidates in discovery order, deduplicated by identifier.
    pub candidates: Vec<PluginCandidate>,

    /// Per-path discovery errors; never fatal to the scan.
    pub errors: Vec<PluginError>,
}

/// Scan the search paths in order, earliest path first.
pub fn scan(search_paths: &[PathBuf]) -> ScanReport {
    let mut report = ScanReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for dir in search_paths {
        if !dir.exists() {
            debug!(path = %dir.display(), "search path does not exist, skipping");
            continue;
        }

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read search path");
                report.errors.push(PluginError::Discovery {
                    path: dir.clone(),
                    details: e.to_string(),
                });
                continue;
            }
        };

        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .collect();

        // Sort for deterministic discovery order within a directory.
        files.sort_by_key(|e| e.file_name());

        for entry in files {
            let path = entry.path();
            let Some(identifier) = candidate_identifier(&path) else {
                continue;
            };

            if !seen.insert(identifier.clone()) {
                debug!(
                    plugin = %identifier,
                    path = %path.display(),
                    "duplicate identifier, first occurrence wins"
                );
                continue;
            }

            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            // Absolute paths key the discovery cache and map watcher events
            // back to their owning plugin.
            let source = path.canonicalize().unwrap_or(path);

            report.candidates.push(PluginCandidate {
                identifier,
                source,
                modified,
            });
        }
    }

    report
}

/// Derive the plugin identifier from a manifest path.
///
/// Returns `None` when the file does not follow the naming convention.
pub fn candidate_identifier(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let identifier = stem.strip_prefix(MANIFEST_PREFIX)?;
    if identifier.is_empty() {
        return None;
    }
    Some(identifier.to_string())
}
