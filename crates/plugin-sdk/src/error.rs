//! Errors crossing the host/plugin boundary.

use thiserror::Error;

/// Failure raised by a plugin while talking to the host, or by the host
/// while driving a plugin's entry points.
#[derive(Debug, Error)]
pub enum HostError {
    /// A command id was staged twice during a single registration.
    #[error("duplicate command id '{0}'")]
    DuplicateCommand(String),

    /// The registration entry point failed.
    #[error("registration failed: {0}")]
    Registration(String),

    /// A lifecycle hook failed.
    #[error("lifecycle hook '{hook}' failed: {details}")]
    Hook { hook: &'static str, details: String },
}

impl HostError {
    /// Create a registration failure.
    pub fn registration(details: impl Into<String>) -> Self {
        Self::Registration(details.into())
    }

    /// Create a lifecycle hook failure.
    pub fn hook(hook: &'static str, details: impl Into<String>) -> Self {
        Self::Hook {
            hook,
            details: details.into(),
        }
    }
}
