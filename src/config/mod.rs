//! Project configuration management for `forge.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── serve      # [serve]   managed HTTP server
//! │   ├── build      # [build]   bundle + source set
//! │   ├── assets     # [assets]  bundler integration
//! │   ├── manifest   # [manifest] regeneration command
//! │   ├── meta       # [[meta]]  meta-file globs
//! │   └── tests      # [tests]   runner + suites
//! ├── error.rs       # ConfigError
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! The loaded `ProjectConfig` is passed explicitly (usually behind an `Arc`)
//! into every component constructor; no component reads ambient global state.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{
    AssetsConfig, BuildConfig, ManifestConfig, MetaFilePattern, ServeConfig, TestSuite,
    TestsConfig,
};

use crate::log;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing `forge.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Managed dev-server settings
    pub serve: ServeConfig,

    /// Production build settings
    pub build: BuildConfig,

    /// Assets bundler settings
    pub assets: AssetsConfig,

    /// Manifest regeneration settings
    pub manifest: ManifestConfig,

    /// Meta-file glob entries (ordered)
    pub meta: Vec<MetaFilePattern>,

    /// Test-runner settings
    pub tests: TestsConfig,
}

impl ProjectConfig {
    /// Load configuration, searching upward from the current directory.
    ///
    /// The project root is the config file's parent directory.
    pub fn load(config_name: &Path) -> Result<Self> {
        let config_path = find_config_file(config_name)
            .ok_or_else(|| ConfigError::NotFound(config_name.to_path_buf()))?;

        let mut config = Self::from_path(&config_path)?;

        config.root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .map_err(|err| ConfigError::Parse(path.to_path_buf(), err))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Semantic validation after parsing.
    fn validate(&self) -> Result<()> {
        for entry in &self.meta {
            glob::Pattern::new(&entry.pattern).map_err(|e| {
                ConfigError::Invalid(format!("meta pattern '{}': {e}", entry.pattern))
            })?;
        }
        for suite in &self.tests.suites {
            for files in &suite.files {
                glob::Pattern::new(files).map_err(|e| {
                    ConfigError::Invalid(format!("suite '{}' glob '{files}': {e}", suite.name))
                })?;
            }
        }
        if self.serve.script.is_empty() {
            return Err(ConfigError::Invalid("serve.script must not be empty".into()).into());
        }
        Ok(())
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// File name of the root config file (e.g. `forge.toml`), relative form.
    ///
    /// The classifier compares relative event paths against this name.
    pub fn rc_file_name(&self) -> String {
        self.config_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "forge.toml".into())
    }
}

/// Find config file by searching upward from current directory.
///
/// Starts from cwd and walks up parent directories until finding
/// `config_name`. Returns the absolute path to the config file if found.
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // Reached filesystem root
        }
    }
}

// ============================================================================
// Test helpers
// ============================================================================

/// Parse a TOML snippet into a `ProjectConfig` for section tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    toml::from_str(content).expect("test config should parse")
}
