//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::Result;

use crate::plugin::EnablePolicy;

/// Built-in plugin search path, always scanned first.
pub const BUILTIN_PLUGIN_PATH: &str = "./plugins";

/// Host configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ordered plugin search paths: the built-in path, then any paths from
    /// `CADRE_PLUGIN_PATH` in declaration order.
    pub plugin_paths: Vec<PathBuf>,

    /// Plugin names enabled to the exclusion of everything else
    /// (from `CADRE_PLUGIN_ALLOWLIST`).
    pub plugin_allowlist: Vec<String>,

    /// Plugin names force-disabled (from `CADRE_PLUGIN_DENYLIST`; ignored
    /// when the allowlist is non-empty).
    pub plugin_denylist: Vec<String>,

    /// Whether the discovery cache is consulted and updated
    /// (from `CADRE_PLUGIN_CACHE`).
    pub plugin_cache: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut plugin_paths = vec![PathBuf::from(BUILTIN_PLUGIN_PATH)];
        if let Ok(raw) = env::var("CADRE_PLUGIN_PATH") {
            plugin_paths.extend(env::split_paths(&raw).filter(|p| !p.as_os_str().is_empty()));
        }

        let plugin_allowlist = name_list(env::var("CADRE_PLUGIN_ALLOWLIST").ok());
        let plugin_denylist = name_list(env::var("CADRE_PLUGIN_DENYLIST").ok());
        let plugin_cache = env::var("CADRE_PLUGIN_CACHE")
            .map(|v| bool_like(&v))
            .unwrap_or(false);

        Ok(Self {
            plugin_paths,
            plugin_allowlist,
            plugin_denylist,
            plugin_cache,
        })
    }

    /// Enable/disable policy for this configuration.
    pub fn policy(&self) -> EnablePolicy {
        EnablePolicy::new(self.plugin_allowlist.clone(), self.plugin_denylist.clone())
    }
}

fn name_list(raw: Option<String>) -> Vec<String> {
    raw.map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn bool_like(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
