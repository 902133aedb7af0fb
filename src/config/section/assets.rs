//! `[assets]` section configuration.
//!
//! Optional assets bundler: a dev server started alongside the managed
//! HTTP server, and a build step run during `forge build`.
//!
//! # Example
//!
//! ```toml
//! [assets]
//! enabled = true
//! serve_command = ["npx", "vite"]
//! build_command = ["npx", "vite", "build"]
//! ```

use serde::{Deserialize, Serialize};

/// Assets bundler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Enable the bundler integration.
    pub enabled: bool,

    /// Command for the bundler dev server (watch mode).
    pub serve_command: Vec<String>,

    /// Command for the one-shot production assets build.
    pub build_command: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            serve_command: vec!["npx".into(), "vite".into()],
            build_command: vec!["npx".into(), "vite".into(), "build".into()],
        }
    }
}

impl AssetsConfig {
    /// True when a dev server should be spawned alongside the HTTP server.
    pub fn has_dev_server(&self) -> bool {
        self.enabled && !self.serve_command.is_empty()
    }

    /// True when the bundle pipeline should run the assets build step.
    pub fn has_build_step(&self) -> bool {
        self.enabled && !self.build_command.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_assets_disabled_by_default() {
        let config = test_parse_config("");
        assert!(!config.assets.enabled);
        assert!(!config.assets.has_dev_server());
        assert!(!config.assets.has_build_step());
    }

    #[test]
    fn test_assets_enabled() {
        let config = test_parse_config("[assets]\nenabled = true");
        assert!(config.assets.has_dev_server());
        assert_eq!(config.assets.serve_command, vec!["npx", "vite"]);
    }
}
