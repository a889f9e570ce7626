//! World and scheduler configuration.

use serde::{Deserialize, Serialize};

use engine_component::DuplicatePolicy;

/// Which hook closes each system's per-frame cycle.
///
/// The documented lifecycle names `preupdate` both before and after
/// `update`. Both readings are supported; the choice is explicit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingHook {
    /// `preupdate`, `update`, `postupdate`.
    #[default]
    PostUpdate,
    /// `preupdate`, `update`, `preupdate` (the literal documented sequence).
    RepeatPreUpdate,
}

/// Configuration for a [`World`](crate::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// What `add_component` does when the type is already present.
    pub duplicate_policy: DuplicatePolicy,
    /// Total `initialize` attempts, one per frame, before a system is
    /// permanently deactivated.
    pub init_retry_limit: u32,
    /// Which hook closes the per-frame cycle.
    pub closing_hook: ClosingHook,
}

impl WorldConfig {
    /// Override the duplicate-component policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Override the initialization attempt limit. Values below 1 are
    /// treated as 1.
    #[must_use]
    pub fn with_init_retry_limit(mut self, limit: u32) -> Self {
        self.init_retry_limit = limit.max(1);
        self
    }

    /// Override the closing hook.
    #[must_use]
    pub fn with_closing_hook(mut self, hook: ClosingHook) -> Self {
        self.closing_hook = hook;
        self
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Replace,
            init_retry_limit: 3,
            closing_hook: ClosingHook::PostUpdate,
        }
    }
}
