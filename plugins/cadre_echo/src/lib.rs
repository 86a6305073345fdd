//! Echo plugin: contributes the `echo` command to the cadre host.

use std::sync::Arc;

use async_trait::async_trait;

use cadre_sdk::{CommandSpec, CommandSurface, HostContext, HostError, PluginModule};

/// Module entry point used by the host's static loader.
pub fn module() -> Arc<dyn PluginModule> {
    Arc::new(EchoPlugin)
}

struct EchoPlugin;

#[async_trait]
impl PluginModule for EchoPlugin {
    async fn register(
        &self,
        commands: &mut dyn CommandSurface,
        ctx: &HostContext,
    ) -> Result<Vec<String>, HostError> {
        ctx.logger().debug("registering echo command");
        commands.add_command(
            CommandSpec::new("echo", "Print the given arguments back").with_usage("echo <text>..."),
        )?;
        Ok(vec!["echo".to_string()])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Collect(Vec<CommandSpec>);

    impl CommandSurface for Collect {
        fn add_command(&mut self, spec: CommandSpec) -> Result<(), HostError> {
            self.0.push(spec);
            Ok(())
        }
    }

    #[tokio::test]
    async fn registers_the_echo_command() {
        let plugin = module();
        let mut surface = Collect::default();
        let ctx = HostContext::new("echo", json!({}));

        let ids = plugin.register(&mut surface, &ctx).await.unwrap();
        assert_eq!(ids, vec!["echo"]);
        assert_eq!(surface.0.len(), 1);
        assert_eq!(surface.0[0].id, "echo");
    }
}
