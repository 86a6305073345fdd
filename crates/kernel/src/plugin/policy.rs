//! Layered enable/disable policy.
//!
//! Precedence, evaluated independently for every plugin:
//! 1. A non-empty allowlist enables exactly the listed names; everyone else
//!    is disabled regardless of denylist or defaults.
//! 2. Otherwise, the denylist disables its names.
//! 3. Otherwise, the manifest's `enabled_by_default` governs.

/// Allow/deny configuration, usually resolved from the environment.
#[derive(Debug, Clone, Default)]
pub struct EnablePolicy {
    allowlist: Vec<String>,
    denylist: Vec<String>,
}

/// Outcome of policy evaluation for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Enabled,
    Disabled { reason: String },
}

impl EnablePolicy {
    /// Create a policy from allowlist and denylist name sets.
    pub fn new(allowlist: Vec<String>, denylist: Vec<String>) -> Self {
        Self {
            allowlist,
            denylist,
        }
    }

    /// Decide whether the named plugin is enabled.
    pub fn decide(&self, name: &str, enabled_by_default: bool) -> PolicyDecision {
        if !self.allowlist.is_empty() {
            if self.allowlist.iter().any(|allowed| allowed == name) {
                return PolicyDecision::Enabled;
            }
            return PolicyDecision::Disabled {
                reason: "not in allowlist".to_string(),
            };
        }

        if self.denylist.iter().any(|denied| denied == name) {
            return PolicyDecision::Disabled {
                reason: "denylisted".to_string(),
            };
        }

        if enabled_by_default {
            PolicyDecision::Enabled
        } else {
            PolicyDecision::Disabled {
                reason: "disabled by default".to_string(),
            }
        }
    }
}
