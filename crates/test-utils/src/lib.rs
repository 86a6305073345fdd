//! Testing helpers for the cadre kernel.
//!
//! Scripted plugin modules and loaders that let tests drive every lifecycle
//! outcome (clean loads, registration failures, reload rollbacks) without
//! compiling real plugin crates.

// Test support: panicking on bad setup is the desired behavior here.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;

use cadre_kernel::plugin::{ModuleLoader, PluginCandidate, PluginManifest};
use cadre_sdk::{CommandSpec, CommandSurface, HostContext, HostError, PluginModule, StatePayload};

/// A fully scripted plugin module.
///
/// Behavior is configured up front with the builder methods; every hook
/// records what happened so tests can assert against it afterwards.
#[derive(Default)]
pub struct ScriptedModule {
    commands: Vec<CommandSpec>,
    fail_register: Option<String>,
    fail_restore: bool,
    state: Mutex<StatePayload>,
    restored: Mutex<Option<StatePayload>>,
    reloaded: AtomicUsize,
}

impl ScriptedModule {
    /// A module that registers nothing and succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command to register.
    #[must_use]
    pub fn with_command(mut self, id: &str, summary: &str) -> Self {
        self.commands.push(CommandSpec::new(id, summary));
        self
    }

    /// Make the registration entry point fail with the given message.
    #[must_use]
    pub fn failing_register(mut self, message: &str) -> Self {
        self.fail_register = Some(message.to_string());
        self
    }

    /// Make the restore hook fail.
    #[must_use]
    pub fn failing_restore(mut self) -> Self {
        self.fail_restore = true;
        self
    }

    /// Seed the module's state bag.
    #[must_use]
    pub fn with_state(self, payload: StatePayload) -> Self {
        *self.state.lock() = payload;
        self
    }

    /// Insert one key into the module's state bag.
    pub fn set_state_value(&self, key: &str, value: serde_json::Value) {
        self.state.lock().insert(key.to_string(), value);
    }

    /// Current state bag contents.
    pub fn state(&self) -> StatePayload {
        self.state.lock().clone()
    }

    /// Payload handed to `restore_state`, if the hook ran.
    pub fn restored(&self) -> Option<StatePayload> {
        self.restored.lock().clone()
    }

    /// How many times `on_reloaded` fired.
    pub fn reload_notifications(&self) -> usize {
        self.reloaded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginModule for ScriptedModule {
    async fn register(
        &self,
        commands: &mut dyn CommandSurface,
        _ctx: &HostContext,
    ) -> Result<Vec<String>, HostError> {
        if let Some(message) = &self.fail_register {
            return Err(HostError::registration(message.clone()));
        }
        let mut ids = Vec::new();
        for spec in &self.commands {
            commands.add_command(spec.clone())?;
            ids.push(spec.id.clone());
        }
        Ok(ids)
    }

    async fn capture_state(&self) -> Result<StatePayload, HostError> {
        Ok(self.state.lock().clone())
    }

    async fn restore_state(&self, payload: StatePayload) -> Result<(), HostError> {
        if self.fail_restore {
            return Err(HostError::hook("restore_state", "scripted failure"));
        }
        *self.state.lock() = payload.clone();
        *self.restored.lock() = Some(payload);
        Ok(())
    }

    async fn on_reloaded(&self) -> Result<(), HostError> {
        self.reloaded.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum LoadStep {
    Module(Arc<ScriptedModule>),
    Failure(String),
}

/// Loader that hands out pre-scripted modules by identifier.
///
/// Each load for an identifier consumes the next scripted step, so a test
/// can script "first load succeeds, the reload fails" exactly. The order of
/// `load` calls is recorded for assertions about load sequencing.
#[derive(Default)]
pub struct ScriptedLoader {
    steps: Mutex<HashMap<String, Vec<LoadStep>>>,
    load_order: Mutex<Vec<String>>,
    loads: AtomicUsize,
}

impl ScriptedLoader {
    /// An empty loader; every load fails until steps are scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next load of `identifier` to return `module`.
    pub fn push_module(&self, identifier: &str, module: Arc<ScriptedModule>) {
        self.steps
            .lock()
            .entry(identifier.to_string())
            .or_default()
            .push(LoadStep::Module(module));
    }

    /// Script the next load of `identifier` to fail.
    pub fn push_failure(&self, identifier: &str, message: &str) {
        self.steps
            .lock()
            .entry(identifier.to_string())
            .or_default()
            .push(LoadStep::Failure(message.to_string()));
    }

    /// Total number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Identifiers in the order they were loaded.
    pub fn load_order(&self) -> Vec<String> {
        self.load_order.lock().clone()
    }
}

#[async_trait]
impl ModuleLoader for ScriptedLoader {
    async fn load(
        &self,
        candidate: &PluginCandidate,
        _manifest: &PluginManifest,
    ) -> Result<Arc<dyn PluginModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.load_order.lock().push(candidate.identifier.clone());

        let mut steps = self.steps.lock();
        let queue = steps.get_mut(&candidate.identifier);
        let Some(queue) = queue.filter(|q| !q.is_empty()) else {
            bail!("no module scripted for '{}'", candidate.identifier);
        };
        match queue.remove(0) {
            LoadStep::Module(module) => Ok(module),
            LoadStep::Failure(message) => bail!("{message}"),
        }
    }
}

/// Write `plugin_<identifier>.toml` with the given body into `dir`.
pub fn write_manifest(dir: &Path, identifier: &str, body: &str) -> PathBuf {
    let path = dir.join(format!("plugin_{identifier}.toml"));
    std::fs::write(&path, body).expect("failed to write test manifest");
    path
}

/// Minimal manifest body for `name`, with extra TOML lines appended.
pub fn manifest_body(name: &str, extra: &str) -> String {
    let mut body = format!("name = \"{name}\"\nversion = \"1.0.0\"\n");
    body.push_str(extra);
    body
}
