//! Cadre host binary.
//!
//! Loads plugins from the configured search paths and serves their commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use semver::Version;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cadre_kernel::cli;
use cadre_kernel::config::Config;
use cadre_kernel::plugin::{HostOptions, PluginHost, StaticLoader, default_cache_path};

#[derive(Parser)]
#[command(name = "cadre", about = "Plugin-driven command host", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List plugins and their load outcome.
    List,
    /// Load plugins and keep the host running.
    Run {
        /// Watch the search paths and hot-reload plugins on change.
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let host_version: Version = env!("CARGO_PKG_VERSION")
        .parse()
        .context("invalid host version")?;

    let mut options = HostOptions::new(host_version, config.plugin_paths.clone())
        .with_policy(config.policy());
    if config.plugin_cache {
        options = options.with_cache_path(default_cache_path());
    }

    // First-party plugins are compiled in; their manifests on the search
    // paths decide whether and in what order they load.
    let loader = StaticLoader::new()
        .register("echo", cadre_echo::module)
        .register("tally", cadre_tally::module);

    let host = Arc::new(PluginHost::new(options, Arc::new(loader))?);

    match args.command {
        Command::List => cli::cmd_plugin_list(&host).await,
        Command::Run { watch } => cli::cmd_run(host, watch).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
