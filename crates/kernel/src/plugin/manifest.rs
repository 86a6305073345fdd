//! Parser for `plugin_<name>.toml` manifest files.
//!
//! Each plugin declares its metadata in a manifest named after it:
//! - name, version, summary
//! - dependencies (other plugins that must load first)
//! - host version bounds and the default enablement flag
//!
//! Validation failures are isolated per candidate; one bad manifest never
//! aborts validation of the others.

use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use super::error::PluginError;
use super::scanner::PluginCandidate;

/// Plugin metadata parsed from a manifest file.
///
/// Immutable once parsed for a given load cycle. Serializes cleanly so the
/// discovery cache can persist parsed manifests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin machine name; must match the identifier in the file name.
    pub name: String,

    /// Plugin version (defaults to 0.0.0 when omitted).
    #[serde(default = "zero_version")]
    pub version: Version,

    /// Human-readable one-liner.
    #[serde(default)]
    pub summary: Option<String>,

    /// Capability flags advertised to the host. Treated as a set.
    #[serde(default)]
    pub features: Vec<String>,

    /// Names of plugins that must load before this one. Treated as a set.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Lowest host version this plugin supports (inclusive).
    #[serde(default)]
    pub min_host_version: Option<Version>,

    /// Highest host version this plugin supports (inclusive).
    #[serde(default)]
    pub max_host_version: Option<Version>,

    /// Whether the plugin loads when no allowlist or denylist says otherwise.
    #[serde(default = "default_true")]
    pub enabled_by_default: bool,

    /// Free-form labels for listings.
    #[serde(default)]
    pub tags: Vec<String>,
}

fn zero_version() -> Version {
    Version::new(0, 0, 0)
}

fn default_true() -> bool {
    true
}

impl PluginManifest {
    /// Parse and validate the manifest for a discovered candidate.
    pub fn load(candidate: &PluginCandidate) -> Result<Self, PluginError> {
        let content = std::fs::read_to_string(&candidate.source)
            .map_err(|e| PluginError::metadata(&candidate.source, e))?;
        Self::parse_str(&content, &candidate.source, &candidate.identifier)
    }

    /// Parse manifest TOML; `identifier` is the name the file layout implies.
    pub fn parse_str(content: &str, path: &Path, identifier: &str) -> Result<Self, PluginError> {
        let manifest: PluginManifest =
            toml::from_str(content).map_err(|e| PluginError::metadata(path, e.message()))?;
        manifest.validate(path, identifier)?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path, identifier: &str) -> Result<(), PluginError> {
        if self.name.is_empty() {
            return Err(PluginError::metadata(path, "'name' must not be empty"));
        }
        if self.name != identifier {
            return Err(PluginError::metadata(
                path,
                format!(
                    "'name' is '{}' but the file name implies '{identifier}'",
                    self.name
                ),
            ));
        }
        if self.depends_on.iter().any(|dep| dep == &self.name) {
            return Err(PluginError::metadata(
                path,
                format!("plugin '{}' depends on itself", self.name),
            ));
        }
        Ok(())
    }
}
