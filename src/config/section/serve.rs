//! `[serve]` section configuration.
//!
//! Settings for the managed HTTP dev server process.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! script = "bin/server.ts"    # Entry script handed to the runner
//! runner = "node"             # Program used to run the script
//! port = 3333                 # Port override (otherwise PORT env / .env files)
//! clear_screen = true         # Clear terminal before each restart
//! node_args = ["--enable-source-maps"]
//! script_args = []
//!
//! [serve.env]
//! TZ = "UTC"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Managed dev-server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Entry script of the HTTP server.
    pub script: String,

    /// Program used to execute the script.
    pub runner: String,

    /// Port override. When unset, the allocator consults the environment
    /// snapshot, then `.env` file variants, then falls back to 3333.
    pub port: Option<u16>,

    /// Host injected as `HOST` for the child. `0.0.0.0` is remapped to
    /// `127.0.0.1` for display only, never for binding.
    pub host: Option<String>,

    /// Arguments passed to the runner before the script.
    pub node_args: Vec<String>,

    /// Arguments passed to the script itself.
    pub script_args: Vec<String>,

    /// Extra environment variables for the child process.
    pub env: BTreeMap<String, String>,

    /// Clear the terminal before each restart.
    pub clear_screen: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            script: "bin/server.ts".into(),
            runner: "node".into(),
            port: None,
            host: None,
            node_args: Vec::new(),
            script_args: Vec::new(),
            env: BTreeMap::new(),
            clear_screen: true,
        }
    }
}
