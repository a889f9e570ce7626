//! Host configuration file.
//!
//! ```json
//! {
//!   "tick": { "tick_rate": 30.0, "max_ticks": 600 },
//!   "world": { "duplicate_policy": "reject", "init_retry_limit": 5 }
//! }
//! ```
//!
//! Every field is optional and falls back to its default.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use engine_ecs::WorldConfig;

use crate::tick::TickConfig;

/// Everything the host reads from its config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tick: TickConfig,
    pub world: WorldConfig,
}

impl AppConfig {
    /// Parse a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid config")
    }

    /// Load `path`, or the defaults if no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use engine_ecs::{ClosingHook, DuplicatePolicy};

    use super::*;

    #[test]
    fn test_missing_path_gives_defaults() {
        assert_eq!(AppConfig::load(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_json(
            r#"{ "tick": { "max_ticks": 10 }, "world": { "closing_hook": "repeat_pre_update" } }"#,
        )
        .unwrap();
        assert_eq!(config.tick.max_ticks, 10);
        assert_eq!(config.tick.tick_rate, 60.0);
        assert_eq!(config.world.closing_hook, ClosingHook::RepeatPreUpdate);
        assert_eq!(config.world.duplicate_policy, DuplicatePolicy::Replace);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(AppConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/engine.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
