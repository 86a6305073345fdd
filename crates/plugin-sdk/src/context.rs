//! Shared services handed to plugins at registration time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// UTC clock function injected by the host.
///
/// Tests substitute a fixed clock via [`HostContext::with_clock`].
pub type UtcClock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Context bag of shared services passed to the registration entry point.
///
/// Three services are always present: a plugin-scoped logger, structured
/// configuration, and a UTC clock. Anything else is an optional extra; a
/// missing extra is `None`, never a failure.
#[derive(Clone)]
pub struct HostContext {
    plugin: String,
    config: Value,
    clock: UtcClock,
    extras: HashMap<String, Value>,
}

impl HostContext {
    /// Create a context for the named plugin with its configuration slice.
    pub fn new(plugin: impl Into<String>, config: Value) -> Self {
        Self {
            plugin: plugin.into(),
            config,
            clock: Arc::new(Utc::now),
            extras: HashMap::new(),
        }
    }

    /// Replace the clock (fixed clocks in tests).
    #[must_use]
    pub fn with_clock(mut self, clock: UtcClock) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an optional extra service value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Name of the plugin this context was built for.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Structured configuration handed down by the host.
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Current UTC time from the host-provided clock.
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Look up an optional extra service value.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    /// Plugin-scoped logger emitting through the host's subscriber.
    pub fn logger(&self) -> PluginLogger {
        PluginLogger {
            plugin: self.plugin.clone(),
        }
    }
}

/// Logger carrying the owning plugin's name on every event.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin: String,
}

impl PluginLogger {
    /// Log at debug level.
    pub fn debug(&self, message: &str) {
        tracing::debug!(target: "cadre::plugin", plugin = %self.plugin, "{message}");
    }

    /// Log at info level.
    pub fn info(&self, message: &str) {
        tracing::info!(target: "cadre::plugin", plugin = %self.plugin, "{message}");
    }

    /// Log at warn level.
    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "cadre::plugin", plugin = %self.plugin, "{message}");
    }

    /// Log at error level.
    pub fn error(&self, message: &str) {
        tracing::error!(target: "cadre::plugin", plugin = %self.plugin, "{message}");
    }
}
