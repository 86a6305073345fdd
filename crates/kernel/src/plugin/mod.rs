//! Plugin system for cadre.
//!
//! This module handles:
//! - Discovering `plugin_<name>.toml` manifests on the search paths
//! - Parsing and validating plugin metadata
//! - Dependency-ordered loading with cycle detection
//! - Version and enable/disable gating
//! - The live command registry and hot reload of running plugins

mod cache;
mod commands;
mod dependency;
mod error;
mod manifest;
mod policy;
mod registrar;
mod registry;
mod reload;
mod scanner;
mod version;
mod watch;

pub use cache::{DiscoveryCache, default_cache_path};
pub use commands::{CommandBinding, CommandRegistry, StagedCommands};
pub use dependency::{Exclusion, Resolution, dependents_closure, resolve};
pub use error::PluginError;
pub use manifest::PluginManifest;
pub use policy::{EnablePolicy, PolicyDecision};
pub use registrar::{
    HostOptions, LoadReport, ModuleFactory, ModuleLoader, PluginHost, StaticLoader,
};
pub use registry::{PluginRegistry, PluginStatus, RegistryEntry};
pub use reload::{DEFAULT_DEBOUNCE, ReloadEvent, ReloadManager, ReloadOptions};
pub use scanner::{
    MANIFEST_EXTENSION, MANIFEST_PREFIX, PluginCandidate, ScanReport, candidate_identifier, scan,
};
pub use version::check_host;
pub use watch::watch_search_paths;
