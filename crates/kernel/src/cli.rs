//! CLI command implementations for plugin management.
//!
//! These commands drive a full load cycle and report per-plugin outcomes;
//! the host process is short-lived for `list` and long-lived for `run`.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::info;

use crate::plugin::{PluginHost, ReloadManager, ReloadOptions, watch_search_paths};

/// Load all plugins and print each one's outcome.
pub async fn cmd_plugin_list(host: &PluginHost) -> Result<()> {
    let report = host.load_all().await;
    let entries = host.registry().snapshot();

    if entries.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<14} {:<18} {:<9} {:<9} DETAIL",
        "PLUGIN", "VERSION", "STATE", "DEFAULT", "COMMANDS"
    );
    println!("{}", "-".repeat(86));

    for entry in &entries {
        let default = if entry.manifest.enabled_by_default {
            "yes"
        } else {
            "no"
        };
        let detail = entry.error.as_deref().unwrap_or("-");
        println!(
            "{:<20} {:<14} {:<18} {:<9} {:<9} {}",
            entry.manifest.name,
            entry.manifest.version.to_string(),
            entry.status.to_string(),
            default,
            entry.command_ids.len(),
            detail
        );
    }

    println!();
    println!(
        "{} registered, {} failed, {} skipped",
        report.registered,
        report.failed,
        report.skipped()
    );
    Ok(())
}

/// Load all plugins and keep the host alive; with `watch`, supervise the
/// search paths and hot-reload plugins until interrupted.
pub async fn cmd_run(host: Arc<PluginHost>, watch: bool) -> Result<()> {
    let report = host.load_all().await;
    info!(
        registered = report.registered,
        commands = host.commands().len(),
        "host ready"
    );

    if !watch {
        return Ok(());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let _watcher = watch_search_paths(&host.options().search_paths, tx)
        .context("failed to start the plugin file watcher")?;
    let manager = ReloadManager::spawn(Arc::clone(&host), rx, ReloadOptions::default());

    info!("watching plugin search paths; press Ctrl-C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    manager.shutdown().await;
    Ok(())
}
