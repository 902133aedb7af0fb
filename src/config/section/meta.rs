//! `[[meta]]` entries configuration.
//!
//! Meta files are non-source files (assets, templates, env files) tracked
//! for copy-into-bundle and watch purposes. An entry flagged with
//! `reload_server = true` forces a dev-server restart when it changes.
//!
//! # Example
//!
//! ```toml
//! [[meta]]
//! pattern = "public/**"
//! reload_server = false
//!
//! [[meta]]
//! pattern = "resources/views/**/*.edge"
//! reload_server = true
//! ```

use serde::{Deserialize, Serialize};

/// One meta-file glob entry. Order is preserved from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFilePattern {
    /// Glob matched against project-relative forward-slash paths.
    pub pattern: String,

    /// Restart the managed server when a matching file changes.
    #[serde(default)]
    pub reload_server: bool,
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_meta_entries_ordered() {
        let config = test_parse_config(
            "[[meta]]\npattern = \"public/**\"\n\n[[meta]]\npattern = \".env\"\nreload_server = true",
        );

        assert_eq!(config.meta.len(), 2);
        assert_eq!(config.meta[0].pattern, "public/**");
        assert!(!config.meta[0].reload_server);
        assert!(config.meta[1].reload_server);
    }

    #[test]
    fn test_meta_default_empty() {
        let config = test_parse_config("");
        assert!(config.meta.is_empty());
    }
}
