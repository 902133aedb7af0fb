//! `[build]` section configuration.
//!
//! Settings for the one-shot production bundle and for the watcher's
//! source-file detection.
//!
//! # Example
//!
//! ```toml
//! [build]
//! out_dir = "build"               # Overrides tsconfig outDir
//! stop_on_error = true            # Abort bundle on compiler diagnostics
//! compile_command = ["npx", "tsc"]
//! entry = "bin/server.js"         # Shown in the post-build summary
//! ancillary_script = "ace.js"     # Copied into the bundle unconditionally
//! sources = ["**/*.ts"]           # Watcher's source set (tsconfig includes)
//! ignore = ["node_modules/**"]
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Production build and source-set settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Output directory. When unset, resolved from tsconfig's `outDir`,
    /// falling back to `build`.
    pub out_dir: Option<PathBuf>,

    /// Abort the bundle (and delete the incomplete output) when the
    /// compiler reports diagnostics.
    pub stop_on_error: bool,

    /// Command invoking the TypeScript compiler.
    pub compile_command: Vec<String>,

    /// tsconfig file consulted for `outDir` resolution.
    pub tsconfig: PathBuf,

    /// Compiled entry point, used in the post-build summary.
    pub entry: String,

    /// Ancillary entry script copied into the bundle regardless of the
    /// compiler outcome.
    pub ancillary_script: String,

    /// Globs approximating the compiler's included file set. Watcher events
    /// on matching paths are reported as source events.
    pub sources: Vec<String>,

    /// Globs excluded from source detection and watching.
    pub ignore: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: None,
            stop_on_error: true,
            compile_command: vec!["npx".into(), "tsc".into()],
            tsconfig: PathBuf::from("tsconfig.json"),
            entry: "bin/server.js".into(),
            ancillary_script: "ace.js".into(),
            sources: vec!["**/*.ts".into(), "**/*.tsx".into()],
            ignore: vec!["node_modules/**".into(), ".git/**".into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_build_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.out_dir, None);
        assert!(config.build.stop_on_error);
        assert_eq!(config.build.compile_command, vec!["npx", "tsc"]);
        assert_eq!(config.build.tsconfig, PathBuf::from("tsconfig.json"));
    }

    #[test]
    fn test_build_config_override() {
        let config = test_parse_config(
            "[build]\nout_dir = \"dist\"\nstop_on_error = false\ncompile_command = [\"tsc\"]",
        );
        assert_eq!(config.build.out_dir, Some(PathBuf::from("dist")));
        assert!(!config.build.stop_on_error);
        assert_eq!(config.build.compile_command, vec!["tsc"]);
    }
}
