//! Hot-reload supervision: change debouncing and module swapping.
//!
//! The manager runs as a background task for the lifetime of the host. It
//! consumes a plain channel of changed paths (the file-watch primitive is a
//! collaborator, see [`super::watch`], that only has to deliver "path
//! changed" events), coalesces bursts per plugin through a delay queue, and
//! runs each plugin's reload independently of every other plugin's.
//!
//! Per watched plugin the lifecycle is: idle → change pending → debouncing
//! (further changes restart the timer) → reloading → idle again, or rolled
//! back on failure with the previous module left untouched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tokio_util::time::delay_queue::Key;
use tracing::{debug, info, warn};

use super::registrar::PluginHost;
use super::registry::PluginStatus;

/// Debounce window applied to change bursts for a single plugin.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Tuning for the reload manager.
#[derive(Debug, Clone)]
pub struct ReloadOptions {
    /// Quiet period required before a pending change triggers a reload.
    pub debounce: Duration,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Reload lifecycle notifications.
#[derive(Debug, Clone)]
pub enum ReloadEvent {
    /// The swap completed; the new module is live.
    Completed { plugin: String },

    /// The reload failed and was rolled back; the previous module keeps
    /// running untouched.
    RolledBack { plugin: String, error: String },
}

/// Handle to a running reload manager.
pub struct ReloadManager {
    events: broadcast::Sender<ReloadEvent>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ReloadManager {
    /// Spawn the manager over a stream of changed paths.
    pub fn spawn(
        host: Arc<PluginHost>,
        changes: mpsc::UnboundedReceiver<PathBuf>,
        options: ReloadOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(
            host,
            changes,
            options,
            events.clone(),
            shutdown.clone(),
        ));
        Self {
            events,
            shutdown,
            task,
        }
    }

    /// Subscribe to reload outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Stop supervising. Reloads already past debouncing run to completion.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}

async fn run(
    host: Arc<PluginHost>,
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
    options: ReloadOptions,
    events: broadcast::Sender<ReloadEvent>,
    shutdown: CancellationToken,
) {
    let mut pending: DelayQueue<String> = DelayQueue::new();
    let mut keys: HashMap<String, Key> = HashMap::new();
    // One async mutex per plugin serializes its reloads; reloads of
    // different plugins never wait on each other.
    let mut locks: HashMap<String, Arc<Mutex<()>>> = HashMap::new();

    loop {
        tokio::select! {
            maybe = changes.recv() => {
                let Some(path) = maybe else { break };
                let Some(plugin) = host.plugin_for_source(&path) else {
                    debug!(path = %path.display(), "change event for an unowned path, ignoring");
                    continue;
                };
                // Only live plugins are supervised; a rejected or failed
                // entry has nothing to swap.
                if host
                    .registry()
                    .get(&plugin)
                    .is_none_or(|entry| entry.status != PluginStatus::Registered)
                {
                    debug!(plugin = %plugin, "change event for a non-registered plugin, ignoring");
                    continue;
                }
                match keys.get(&plugin) {
                    // Already debouncing: restart the window. The old timer
                    // is cancelled in place, so bursts of writes collapse
                    // into one reload without leaking timers.
                    Some(key) => {
                        pending.reset(key, options.debounce);
                    }
                    None => {
                        let key = pending.insert(plugin.clone(), options.debounce);
                        debug!(plugin = %plugin, "change detected, debouncing");
                        keys.insert(plugin, key);
                    }
                }
            }
            expired = std::future::poll_fn(|cx| pending.poll_expired(cx)), if !pending.is_empty() => {
                let Some(expired) = expired else { continue };
                let plugin = expired.into_inner();
                keys.remove(&plugin);
                let lock = Arc::clone(
                    locks
                        .entry(plugin.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(()))),
                );
                let host = Arc::clone(&host);
                let events = events.clone();
                tokio::spawn(async move {
                    let _guard = lock.lock().await;
                    match host.reload_plugin(&plugin).await {
                        Ok(()) => {
                            info!(plugin = %plugin, "hot reload complete");
                            let _ = events.send(ReloadEvent::Completed { plugin });
                        }
                        Err(e) => {
                            warn!(plugin = %plugin, error = %e, "hot reload rolled back");
                            let _ = events.send(ReloadEvent::RolledBack {
                                plugin,
                                error: e.to_string(),
                            });
                        }
                    }
                });
            }
            () = shutdown.cancelled() => break,
        }
    }
}
