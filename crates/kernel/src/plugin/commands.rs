//! Live command bindings and the staging surface handed to plugins.
//!
//! Registration stages commands into a scratch buffer; the buffer is
//! committed to the live table in one critical section that removes the
//! plugin's old bindings and inserts the new ones. Readers therefore never
//! see the old and new generation of a plugin's commands side by side.

use std::collections::HashMap;

use parking_lot::RwLock;

use cadre_sdk::{CommandSpec, CommandSurface, HostError};

use super::error::PluginError;

/// A live command binding.
#[derive(Debug, Clone)]
pub struct CommandBinding {
    /// Owning plugin name.
    pub plugin: String,

    /// The command as registered.
    pub spec: CommandSpec,
}

/// The host's table of live commands.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<HashMap<String, CommandBinding>>,
}

impl CommandRegistry {
    /// Create an empty command table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a command by id.
    pub fn lookup(&self, id: &str) -> Option<CommandBinding> {
        self.commands.read().get(id).cloned()
    }

    /// Command ids owned by a plugin, sorted.
    pub fn ids_for(&self, plugin: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .commands
            .read()
            .values()
            .filter(|b| b.plugin == plugin)
            .map(|b| b.spec.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// All bindings, sorted by command id.
    pub fn snapshot(&self) -> Vec<CommandBinding> {
        let mut bindings: Vec<_> = self.commands.read().values().cloned().collect();
        bindings.sort_by(|a, b| a.spec.id.cmp(&b.spec.id));
        bindings
    }

    /// Number of live commands.
    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    /// Atomically replace a plugin's bindings.
    ///
    /// Checks staged ids for collisions with other plugins first; on
    /// conflict nothing changes. Otherwise the plugin's old ids are removed
    /// and the staged specs inserted under the same write lock.
    pub(crate) fn commit(
        &self,
        plugin: &str,
        staged: Vec<CommandSpec>,
        old_ids: &[String],
    ) -> Result<(), PluginError> {
        let mut commands = self.commands.write();

        for spec in &staged {
            if let Some(existing) = commands.get(&spec.id) {
                if existing.plugin != plugin {
                    return Err(PluginError::CommandConflict {
                        plugin: plugin.to_string(),
                        command: spec.id.clone(),
                        owner: existing.plugin.clone(),
                    });
                }
            }
        }

        for id in old_ids {
            commands.remove(id);
        }
        for spec in staged {
            commands.insert(
                spec.id.clone(),
                CommandBinding {
                    plugin: plugin.to_string(),
                    spec,
                },
            );
        }
        Ok(())
    }

    /// Remove every binding owned by `plugin` (explicit unload). Returns the
    /// number of bindings removed.
    pub(crate) fn remove_plugin(&self, plugin: &str) -> usize {
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|_, binding| binding.plugin != plugin);
        before - commands.len()
    }
}

/// Scratch surface collecting one plugin's commands during registration.
#[derive(Debug, Default)]
pub struct StagedCommands {
    specs: Vec<CommandSpec>,
}

impl StagedCommands {
    /// Create an empty staging buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids staged so far, in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.id.clone()).collect()
    }

    /// Consume the buffer.
    pub fn into_specs(self) -> Vec<CommandSpec> {
        self.specs
    }
}

impl CommandSurface for StagedCommands {
    fn add_command(&mut self, spec: CommandSpec) -> Result<(), HostError> {
        if self.specs.iter().any(|s| s.id == spec.id) {
            return Err(HostError::DuplicateCommand(spec.id));
        }
        self.specs.push(spec);
        Ok(())
    }
}
