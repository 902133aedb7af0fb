//! `[manifest]` section configuration.
//!
//! The framework keeps a generated command manifest; when a watched source
//! file under the manifest globs changes, the configured command is re-run
//! to regenerate it (in addition to the server restart).
//!
//! # Example
//!
//! ```toml
//! [manifest]
//! command = ["node", "ace", "generate:manifest"]
//! watch = ["commands/**/*.ts"]
//! ```

use serde::{Deserialize, Serialize};

/// Manifest regeneration settings. Disabled when `command` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Command regenerating the manifest.
    pub command: Vec<String>,

    /// Source globs whose changes trigger regeneration.
    pub watch: Vec<String>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            watch: vec!["commands/**/*.ts".into()],
        }
    }
}

impl ManifestConfig {
    /// True when regeneration is configured.
    pub fn is_enabled(&self) -> bool {
        !self.command.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_manifest_disabled_by_default() {
        let config = test_parse_config("");
        assert!(!config.manifest.is_enabled());
    }

    #[test]
    fn test_manifest_enabled() {
        let config =
            test_parse_config("[manifest]\ncommand = [\"node\", \"ace\", \"generate:manifest\"]");
        assert!(config.manifest.is_enabled());
        assert_eq!(config.manifest.watch, vec!["commands/**/*.ts"]);
    }
}
