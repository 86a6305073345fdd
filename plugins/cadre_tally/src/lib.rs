//! Tally plugin: a running counter that survives hot reloads.
//!
//! Demonstrates the reload lifecycle hooks: the count is captured from the
//! outgoing module instance and restored into its replacement, so a code
//! swap never loses the tally.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use cadre_sdk::{CommandSpec, CommandSurface, HostContext, HostError, PluginModule, StatePayload};

/// Module entry point used by the host's static loader.
pub fn module() -> Arc<dyn PluginModule> {
    Arc::new(TallyPlugin::default())
}

#[derive(Default)]
struct TallyPlugin {
    count: AtomicU64,
}

#[async_trait]
impl PluginModule for TallyPlugin {
    async fn register(
        &self,
        commands: &mut dyn CommandSurface,
        ctx: &HostContext,
    ) -> Result<Vec<String>, HostError> {
        ctx.logger().debug("registering tally commands");
        commands.add_command(CommandSpec::new("tally", "Show the current tally"))?;
        commands.add_command(CommandSpec::new("tally.reset", "Reset the tally to zero"))?;
        Ok(vec!["tally".to_string(), "tally.reset".to_string()])
    }

    async fn capture_state(&self) -> Result<StatePayload, HostError> {
        let mut payload = StatePayload::new();
        payload.insert("count".to_string(), json!(self.count.load(Ordering::SeqCst)));
        Ok(payload)
    }

    async fn restore_state(&self, payload: StatePayload) -> Result<(), HostError> {
        if let Some(count) = payload.get("count").and_then(Value::as_u64) {
            self.count.store(count, Ordering::SeqCst);
        }
        Ok(())
    }
}
