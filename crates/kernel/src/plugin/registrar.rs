//! Plugin loading pipeline and the host arena that owns it.
//!
//! Startup runs scanner → validator → resolver → version gate → policy gate
//! → registration as one sequential pass; plugin counts are small and the
//! work is quick file reads, so no concurrency is involved. Every failure is
//! attributed to a single plugin and recorded in the registry; a bad plugin
//! never stops the ones after it.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Result, bail};
use async_trait::async_trait;
use semver::Version;
use serde_json::Value;
use tracing::{debug, info, warn};

use cadre_sdk::{HostContext, PluginModule};

use super::cache::DiscoveryCache;
use super::commands::{CommandRegistry, StagedCommands};
use super::dependency::{self, Exclusion};
use super::error::PluginError;
use super::manifest::PluginManifest;
use super::policy::{EnablePolicy, PolicyDecision};
use super::registry::{PluginRegistry, PluginStatus, RegistryEntry};
use super::scanner::{self, PluginCandidate};
use super::version;

/// Resolves a discovered candidate to a live module handle.
///
/// Implementations decide what "loading" means. The built-in
/// [`StaticLoader`] instantiates modules compiled into the host binary;
/// hosts with other module sources bring their own loader.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(
        &self,
        candidate: &PluginCandidate,
        manifest: &PluginManifest,
    ) -> Result<Arc<dyn PluginModule>>;
}

/// Module factory used by [`StaticLoader`].
pub type ModuleFactory = Arc<dyn Fn() -> Arc<dyn PluginModule> + Send + Sync>;

/// Loader for first-party modules compiled into the host binary.
///
/// A reload re-invokes the factory, producing a fresh module instance that
/// picks up its predecessor's state through the capture/restore hooks.
#[derive(Default)]
pub struct StaticLoader {
    factories: HashMap<String, ModuleFactory>,
}

impl StaticLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `identifier`. A later registration for the
    /// same identifier replaces the earlier one.
    #[must_use]
    pub fn register<F>(mut self, identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn PluginModule> + Send + Sync + 'static,
    {
        self.factories.insert(identifier.into(), Arc::new(factory));
        self
    }
}

#[async_trait]
impl ModuleLoader for StaticLoader {
    async fn load(
        &self,
        candidate: &PluginCandidate,
        _manifest: &PluginManifest,
    ) -> Result<Arc<dyn PluginModule>> {
        match self.factories.get(&candidate.identifier) {
            Some(factory) => Ok(factory()),
            None => bail!(
                "no module registered for identifier '{}'",
                candidate.identifier
            ),
        }
    }
}

/// Host-side knobs for a load cycle.
#[derive(Clone)]
pub struct HostOptions {
    /// Running host version, checked against manifest bounds.
    pub host_version: Version,

    /// Ordered search paths; the built-in path comes first.
    pub search_paths: Vec<PathBuf>,

    /// Allow/deny policy, usually resolved from the environment.
    pub policy: EnablePolicy,

    /// Discovery cache file; `None` disables caching.
    pub cache_path: Option<PathBuf>,

    /// Structured configuration handed to plugins through the context bag.
    pub plugin_config: Value,
}

impl HostOptions {
    /// Options with default policy, no cache, and empty plugin config.
    pub fn new(host_version: Version, search_paths: Vec<PathBuf>) -> Self {
        Self {
            host_version,
            search_paths,
            policy: EnablePolicy::default(),
            cache_path: None,
            plugin_config: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the enable/disable policy.
    #[must_use]
    pub fn with_policy(mut self, policy: EnablePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable the discovery cache at the given file.
    #[must_use]
    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    /// Set the structured configuration passed to plugins.
    #[must_use]
    pub fn with_plugin_config(mut self, config: Value) -> Self {
        self.plugin_config = config;
        self
    }
}

/// Counts per outcome for one startup pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadReport {
    pub discovered: usize,
    pub registered: usize,
    pub failed: usize,
    pub version_rejected: usize,
    pub policy_disabled: usize,
    pub dependency_unmet: usize,
    pub cycle_members: usize,
    pub metadata_errors: usize,
    pub discovery_errors: usize,
}

impl LoadReport {
    /// Plugins excluded before registration was attempted.
    pub fn skipped(&self) -> usize {
        self.version_rejected + self.policy_disabled + self.dependency_unmet + self.cycle_members
    }
}

/// The plugin host: owns the registry, the live command table, and the
/// module loader, and drives load and reload cycles.
pub struct PluginHost {
    options: HostOptions,
    loader: Arc<dyn ModuleLoader>,
    registry: PluginRegistry,
    commands: CommandRegistry,
}

impl PluginHost {
    /// Create a host.
    ///
    /// Fails when no search path is configured; that is a host configuration
    /// error, not a plugin failure, and the only fatal condition here.
    pub fn new(options: HostOptions, loader: Arc<dyn ModuleLoader>) -> Result<Self> {
        if options.search_paths.is_empty() {
            bail!("at least one plugin search path is required");
        }
        Ok(Self {
            options,
            loader,
            registry: PluginRegistry::new(),
            commands: CommandRegistry::new(),
        })
    }

    /// The plugin registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// The live command table.
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// The options this host was created with.
    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    /// Run the full startup pass over a fresh registry.
    pub async fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();

        // Discovery. Per-path errors were already logged by the scanner.
        let scan = scanner::scan(&self.options.search_paths);
        report.discovered = scan.candidates.len();
        report.discovery_errors = scan.errors.len();

        // Validation, through the cache when enabled.
        let mut cache = self.options.cache_path.clone().map(DiscoveryCache::load);
        let mut validated: Vec<(PluginCandidate, PluginManifest)> = Vec::new();
        for candidate in scan.candidates {
            let cached = cache
                .as_ref()
                .and_then(|c| c.lookup(&candidate.source, candidate.modified));
            let manifest = match cached {
                Some(manifest) => {
                    debug!(plugin = %candidate.identifier, "manifest served from discovery cache");
                    manifest
                }
                None => match PluginManifest::load(&candidate) {
                    Ok(manifest) => {
                        if let Some(cache) = cache.as_mut() {
                            cache.store(&candidate.source, candidate.modified, &manifest);
                        }
                        manifest
                    }
                    Err(e) => {
                        report.metadata_errors += 1;
                        warn!(plugin = %candidate.identifier, error = %e, "invalid plugin manifest, skipping");
                        continue;
                    }
                },
            };
            validated.push((candidate, manifest));
        }
        if let Some(cache) = cache.as_mut() {
            let live: HashSet<PathBuf> = validated.iter().map(|(c, _)| c.source.clone()).collect();
            cache.retain_paths(&live);
            cache.persist();
        }

        // Dependency resolution.
        let manifests: Vec<PluginManifest> = validated.iter().map(|(_, m)| m.clone()).collect();
        let resolution = dependency::resolve(&manifests);
        let by_name: HashMap<&str, &(PluginCandidate, PluginManifest)> = validated
            .iter()
            .map(|pair| (pair.1.name.as_str(), pair))
            .collect();

        for (name, exclusion) in &resolution.excluded {
            let Some((candidate, manifest)) = by_name.get(name.as_str()) else {
                continue;
            };
            let error = match exclusion {
                Exclusion::Cycle(members) => {
                    report.cycle_members += 1;
                    PluginError::circular(members)
                }
                Exclusion::UnmetDependency(dep) => {
                    report.dependency_unmet += 1;
                    PluginError::DependencyUnmet {
                        plugin: name.clone(),
                        dependency: dep.clone(),
                    }
                }
            };
            self.reject(candidate, manifest, PluginStatus::DependencyUnmet, &error);
        }

        // Version and policy gates, walked in topological order so that an
        // exclusion propagates to dependents later in the order.
        let mut excluded: HashSet<String> = resolution.excluded.keys().cloned().collect();
        let mut runnable: Vec<String> = Vec::new();
        for name in &resolution.order {
            let Some((candidate, manifest)) = by_name.get(name.as_str()) else {
                continue;
            };

            if let Err(e) = version::check_host(&self.options.host_version, manifest) {
                report.version_rejected += 1;
                self.reject(candidate, manifest, PluginStatus::VersionRejected, &e);
                excluded.insert(name.clone());
                continue;
            }

            if let PolicyDecision::Disabled { reason } =
                self.options.policy.decide(name, manifest.enabled_by_default)
            {
                report.policy_disabled += 1;
                warn!(plugin = %name, status = %PluginStatus::PolicyDisabled, %reason, "plugin skipped");
                self.record(RegistryEntry {
                    manifest: (*manifest).clone(),
                    source: candidate.source.clone(),
                    modified: candidate.modified,
                    handle: None,
                    command_ids: Vec::new(),
                    status: PluginStatus::PolicyDisabled,
                    error: Some(reason),
                    recorded_at: chrono::Utc::now(),
                });
                excluded.insert(name.clone());
                continue;
            }

            if let Some(dep) = manifest
                .depends_on
                .iter()
                .find(|dep| excluded.contains(dep.as_str()))
            {
                report.dependency_unmet += 1;
                let error = PluginError::DependencyUnmet {
                    plugin: name.clone(),
                    dependency: dep.clone(),
                };
                self.reject(candidate, manifest, PluginStatus::DependencyUnmet, &error);
                excluded.insert(name.clone());
                continue;
            }

            runnable.push(name.clone());
        }

        // Registration, dependencies always attempted before dependents. A
        // dependency that failed registration does not skip its dependents;
        // they attempt to load and may fail on their own.
        for name in &runnable {
            let Some((candidate, manifest)) = by_name.get(name.as_str()) else {
                continue;
            };
            match self.register_plugin(candidate, manifest).await {
                Ok(entry) => {
                    report.registered += 1;
                    debug!(plugin = %name, commands = entry.command_ids.len(), "plugin registered");
                    self.record(entry);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(plugin = %name, status = %PluginStatus::Failed, error = %e, "plugin failed to register");
                    self.record(RegistryEntry::rejected(
                        (*manifest).clone(),
                        candidate.source.clone(),
                        candidate.modified,
                        PluginStatus::Failed,
                        &e,
                    ));
                }
            }
        }

        info!(
            registered = report.registered,
            failed = report.failed,
            skipped = report.skipped(),
            commands = self.commands.len(),
            "plugin load complete"
        );
        report
    }

    /// Hot-reload one plugin in place.
    ///
    /// On any error before the swap the reload aborts: the previous module
    /// handle and command bindings stay live and the entry remains
    /// `Registered`. Callers must serialize reloads of the same plugin; the
    /// reload manager does.
    pub async fn reload_plugin(&self, name: &str) -> Result<(), PluginError> {
        let Some(entry) = self.registry.get(name) else {
            return Err(PluginError::reload(name, "not present in the registry"));
        };
        if entry.status != PluginStatus::Registered {
            return Err(PluginError::reload(
                name,
                format!("plugin is {}, only registered plugins reload", entry.status),
            ));
        }
        let Some(old_handle) = entry.handle.clone() else {
            return Err(PluginError::reload(name, "registered entry has no live module"));
        };

        // Capture state from the running module before touching anything.
        let payload = old_handle
            .capture_state()
            .await
            .map_err(|e| PluginError::reload(name, e))?;

        // The swap is driven by what is on disk now: re-read and re-gate the
        // manifest.
        let modified = std::fs::metadata(&entry.source)
            .and_then(|m| m.modified())
            .unwrap_or_else(|_| SystemTime::now());
        let candidate = PluginCandidate {
            identifier: entry.manifest.name.clone(),
            source: entry.source.clone(),
            modified,
        };
        let manifest = PluginManifest::load(&candidate).map_err(|e| PluginError::reload(name, e))?;
        version::check_host(&self.options.host_version, &manifest)
            .map_err(|e| PluginError::reload(name, e))?;

        let new_handle = self
            .loader
            .load(&candidate, &manifest)
            .await
            .map_err(|e| PluginError::reload(name, e))?;

        let ctx = self.context_for(&manifest);
        let mut staged = StagedCommands::new();
        let ids = new_handle
            .register(&mut staged, &ctx)
            .await
            .map_err(|e| PluginError::reload(name, e))?;
        new_handle
            .restore_state(payload)
            .await
            .map_err(|e| PluginError::reload(name, e))?;

        // Point of no return: old bindings out, new bindings in, entry
        // replaced, all behind single locks, so no reader sees both
        // generations at once.
        self.commands
            .commit(name, staged.into_specs(), &entry.command_ids)?;
        self.registry.swap(RegistryEntry::registered(
            manifest,
            entry.source.clone(),
            modified,
            Arc::clone(&new_handle),
            ids,
        ))?;

        if let Err(e) = new_handle.on_reloaded().await {
            warn!(plugin = %name, error = %e, "on_reloaded hook failed after swap");
        }
        debug!(plugin = %name, "plugin reloaded");
        Ok(())
    }

    /// Remove a plugin from the registry and drop its command bindings.
    pub fn unload_plugin(&self, name: &str) -> bool {
        let removed = self.commands.remove_plugin(name);
        let existed = self.registry.remove(name);
        if existed {
            info!(plugin = %name, commands = removed, "plugin unloaded");
        }
        existed
    }

    /// Name of the plugin whose manifest lives at `path`.
    pub fn plugin_for_source(&self, path: &Path) -> Option<String> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.registry.plugin_for_source(&canonical)
    }

    async fn register_plugin(
        &self,
        candidate: &PluginCandidate,
        manifest: &PluginManifest,
    ) -> Result<RegistryEntry, PluginError> {
        let handle = self
            .loader
            .load(candidate, manifest)
            .await
            .map_err(|e| PluginError::registration(&manifest.name, e))?;

        let ctx = self.context_for(manifest);
        let mut staged = StagedCommands::new();
        let ids = handle
            .register(&mut staged, &ctx)
            .await
            .map_err(|e| PluginError::registration(&manifest.name, e))?;

        self.commands.commit(&manifest.name, staged.into_specs(), &[])?;

        Ok(RegistryEntry::registered(
            manifest.clone(),
            candidate.source.clone(),
            candidate.modified,
            handle,
            ids,
        ))
    }

    fn context_for(&self, manifest: &PluginManifest) -> HostContext {
        HostContext::new(&manifest.name, self.options.plugin_config.clone()).with_extra(
            "host_version",
            Value::String(self.options.host_version.to_string()),
        )
    }

    fn reject(
        &self,
        candidate: &PluginCandidate,
        manifest: &PluginManifest,
        status: PluginStatus,
        error: &PluginError,
    ) {
        warn!(plugin = %manifest.name, status = %status, error = %error, "plugin skipped");
        self.record(RegistryEntry::rejected(
            manifest.clone(),
            candidate.source.clone(),
            candidate.modified,
            status,
            error,
        ));
    }

    fn record(&self, entry: RegistryEntry) {
        let name = entry.manifest.name.clone();
        if let Err(e) = self.registry.record(entry) {
            warn!(plugin = %name, error = %e, "failed to record registry entry");
        }
    }
}
