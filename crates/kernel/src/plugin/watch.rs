//! File-watch wiring for hot reload.
//!
//! Bridges `notify` events onto the plain path channel the reload manager
//! consumes. The only contract the watcher must satisfy is delivery of
//! "path changed" events; debouncing and plugin attribution happen in the
//! manager, so tests drive the manager by sending paths directly.

use std::path::PathBuf;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Start watching the search paths, forwarding changed paths to `tx`.
///
/// The returned watcher must be kept alive for as long as events are wanted;
/// dropping it stops the stream.
pub fn watch_search_paths(
    paths: &[PathBuf],
    tx: mpsc::UnboundedSender<PathBuf>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher =
        notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            }
            Err(e) => warn!(error = %e, "file watcher error"),
        })?;

    for path in paths {
        if !path.exists() {
            debug!(path = %path.display(), "not watching missing search path");
            continue;
        }
        watcher.watch(path, RecursiveMode::NonRecursive)?;
    }

    Ok(watcher)
}
