//! Cadre Plugin SDK
//!
//! Types, traits, and host service bindings for cadre plugins. A plugin
//! implements [`PluginModule`] and hands the host a list of the command
//! identifiers it registered; the optional lifecycle hooks let it carry
//! state across a hot reload.

pub mod context;
pub mod error;
pub mod types;

pub use context::{HostContext, PluginLogger, UtcClock};
pub use error::HostError;
pub use types::{CommandSpec, CommandSurface, PluginModule, StatePayload};

pub mod prelude {
    pub use crate::context::{HostContext, PluginLogger, UtcClock};
    pub use crate::error::HostError;
    pub use crate::types::{CommandSpec, CommandSurface, PluginModule, StatePayload};
}
