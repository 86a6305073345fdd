//! Plugin system error types with clear, actionable messages.
//!
//! Every error is attributed to a single plugin (or cycle-member set) and
//! recorded in that plugin's registry entry. None of them abort the
//! discovery, load, or reload pipeline; the pipeline reports them and moves
//! on to the next plugin.

use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;

/// Errors that can occur during plugin discovery, loading, and reload.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A search path could not be read. The scan continues with other paths.
    #[error("search path '{path}' is unreadable: {details}")]
    Discovery { path: PathBuf, details: String },

    /// A candidate's manifest is missing, malformed, or inconsistent.
    #[error("manifest '{path}': {details}")]
    Metadata { path: PathBuf, details: String },

    /// Circular dependency; names the full member set.
    #[error("circular dependency involving plugins: {cycle}")]
    CircularDependency { cycle: String },

    /// A declared dependency is absent, rejected, or disabled.
    #[error("plugin '{plugin}': depends on '{dependency}' which is not available")]
    DependencyUnmet { plugin: String, dependency: String },

    /// The running host version falls outside the plugin's declared bounds.
    #[error("plugin '{plugin}': host {host} outside supported range [{min}, {max}]")]
    VersionIncompatible {
        plugin: String,
        host: String,
        min: String,
        max: String,
    },

    /// The module load or registration entry point failed.
    #[error("plugin '{plugin}': registration failed: {details}")]
    Registration { plugin: String, details: String },

    /// A command id is already owned by another registered plugin.
    #[error("plugin '{plugin}': command '{command}' is already registered by '{owner}'")]
    CommandConflict {
        plugin: String,
        command: String,
        owner: String,
    },

    /// Hot reload failed; the previous module remains in effect.
    #[error("plugin '{plugin}': reload failed: {details}")]
    Reload { plugin: String, details: String },

    /// Two registry entries may never share a name.
    #[error("plugin name '{name}' is already present in the registry")]
    DuplicateName { name: String },
}

impl PluginError {
    /// Create a metadata error for a manifest path.
    pub fn metadata(path: &Path, details: impl std::fmt::Display) -> Self {
        Self::Metadata {
            path: path.to_path_buf(),
            details: details.to_string(),
        }
    }

    /// Create a circular-dependency error naming every member.
    pub fn circular(members: &[String]) -> Self {
        Self::CircularDependency {
            cycle: members.join(", "),
        }
    }

    /// Create a version-incompatibility error; absent bounds render as `*`.
    pub fn version_incompatible(
        plugin: impl Into<String>,
        host: &Version,
        min: Option<&Version>,
        max: Option<&Version>,
    ) -> Self {
        let bound = |b: Option<&Version>| b.map_or_else(|| "*".to_string(), ToString::to_string);
        Self::VersionIncompatible {
            plugin: plugin.into(),
            host: host.to_string(),
            min: bound(min),
            max: bound(max),
        }
    }

    /// Create a registration error.
    pub fn registration(plugin: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::Registration {
            plugin: plugin.into(),
            details: details.to_string(),
        }
    }

    /// Create a reload error.
    pub fn reload(plugin: impl Into<String>, details: impl std::fmt::Display) -> Self {
        Self::Reload {
            plugin: plugin.into(),
            details: details.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn version_error_renders_open_bounds() {
        let host = Version::new(2, 1, 0);
        let max = Version::new(1, 9, 9);
        let err = PluginError::version_incompatible("blog", &host, None, Some(&max));
        let msg = err.to_string();
        assert!(msg.contains("blog"));
        assert!(msg.contains("[*, 1.9.9]"));
    }

    #[test]
    fn circular_error_names_every_member() {
        let members = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let msg = PluginError::circular(&members).to_string();
        assert!(msg.contains("a, b, c"));
    }

    #[test]
    fn unmet_error_names_the_missing_dependency() {
        let err = PluginError::DependencyUnmet {
            plugin: "notes".to_string(),
            dependency: "storage".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("notes"));
        assert!(msg.contains("storage"));
    }
}
