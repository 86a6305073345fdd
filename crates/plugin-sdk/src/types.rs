//! Core types for cadre plugins.
//!
//! The contract between a plugin and the host is structural: any module that
//! exposes a registration entry point with the [`PluginModule::register`]
//! signature is a valid plugin. Conformance is checked when the host calls
//! the entry point, not through a type hierarchy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::HostContext;
use crate::error::HostError;

/// Opaque key-value bag carried across a single hot reload.
///
/// Produced by [`PluginModule::capture_state`] immediately before a swap and
/// consumed by [`PluginModule::restore_state`] immediately after; it is never
/// persisted beyond that one reload.
pub type StatePayload = serde_json::Map<String, serde_json::Value>;

/// A command contributed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Stable command identifier (e.g. `notes.add`).
    pub id: String,

    /// One-line description shown in command listings.
    pub summary: String,

    /// Optional usage string (e.g. `notes add <text>`).
    #[serde(default)]
    pub usage: Option<String>,
}

impl CommandSpec {
    /// Create a command spec with the given id and summary.
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            usage: None,
        }
    }

    /// Attach a usage string.
    #[must_use]
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }
}

/// The host's command-registration surface.
///
/// Handed to [`PluginModule::register`]. Commands staged here only become
/// visible to the host once registration returns successfully; a failed
/// registration leaves the host's live command table untouched.
pub trait CommandSurface: Send {
    /// Stage a command for registration.
    ///
    /// Fails only on a duplicate id within the same registration; collisions
    /// with other plugins are detected by the host when it commits.
    fn add_command(&mut self, spec: CommandSpec) -> Result<(), HostError>;
}

/// A loaded plugin module.
///
/// The lifecycle hooks are independently optional; the default
/// implementations are no-ops, so a plugin without reloadable state only
/// implements [`register`](Self::register).
#[async_trait]
pub trait PluginModule: Send + Sync {
    /// Registration entry point.
    ///
    /// Returns the identifiers of the commands it registered. Expected
    /// conditions such as missing optional context services or absent
    /// configuration keys must degrade gracefully rather than error.
    async fn register(
        &self,
        commands: &mut dyn CommandSurface,
        ctx: &HostContext,
    ) -> Result<Vec<String>, HostError>;

    /// Capture state immediately before a reload swap.
    async fn capture_state(&self) -> Result<StatePayload, HostError> {
        Ok(StatePayload::new())
    }

    /// Restore previously captured state into the replacement module.
    async fn restore_state(&self, _payload: StatePayload) -> Result<(), HostError> {
        Ok(())
    }

    /// Called after a successful swap, once the new module is live.
    async fn on_reloaded(&self) -> Result<(), HostError> {
        Ok(())
    }
}
