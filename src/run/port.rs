//! Session port allocation.
//!
//! The port is chosen once per session and reused across every restart
//! within it. Resolution order:
//!
//! 1. explicit override (CLI flag or `[serve] port`)
//! 2. `PORT` from the captured environment snapshot
//! 3. first `PORT` found scanning `.env` file variants, most specific first
//! 4. the default (3333)
//!
//! A requested port that is already bound is silently replaced by an
//! OS-assigned free one.

use std::net::TcpListener;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;

use crate::debug;

/// Fallback port when nothing else specifies one.
const DEFAULT_PORT: u16 = 3333;

/// Picks the session port.
pub struct PortAllocator {
    root: PathBuf,
    /// Environment snapshot captured at startup; components never read
    /// ambient `std::env` directly.
    env: FxHashMap<String, String>,
}

impl PortAllocator {
    pub fn new(root: &Path, env: FxHashMap<String, String>) -> Self {
        Self {
            root: root.to_path_buf(),
            env,
        }
    }

    /// Allocate the session port, honoring an explicit override.
    pub fn allocate(&self, explicit: Option<u16>) -> Result<u16> {
        let requested = self.requested_port(explicit);
        self.ensure_free(requested)
    }

    /// Resolve the requested port before the availability probe.
    fn requested_port(&self, explicit: Option<u16>) -> u16 {
        if let Some(port) = explicit {
            return port;
        }

        if let Some(port) = self.env.get("PORT").and_then(|v| v.parse().ok()) {
            return port;
        }

        if let Some(port) = self.port_from_env_files() {
            return port;
        }

        DEFAULT_PORT
    }

    /// Scan `.env` file variants for a `PORT` entry, most specific first.
    fn port_from_env_files(&self) -> Option<u16> {
        for name in self.env_file_names() {
            let path = self.root.join(&name);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            if let Some(port) = parse_env_port(&content) {
                debug!("serve"; "PORT {} from {}", port, name);
                return Some(port);
            }
        }
        None
    }

    /// Env file scan order. `<env>` comes from the snapshot's `NODE_ENV`,
    /// defaulting to `development`.
    fn env_file_names(&self) -> Vec<String> {
        let node_env = self
            .env
            .get("NODE_ENV")
            .map(String::as_str)
            .unwrap_or("development");

        vec![
            format!(".env.{node_env}.local"),
            format!(".env.{node_env}"),
            ".env.local".into(),
            ".env".into(),
        ]
    }

    /// Probe the requested port; fall back to an OS-assigned free port.
    fn ensure_free(&self, requested: u16) -> Result<u16> {
        if TcpListener::bind(("127.0.0.1", requested)).is_ok() {
            return Ok(requested);
        }

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .context("failed to find a free port (bind on port 0 failed)")?;
        let port = listener.local_addr()?.port();
        crate::log!("serve"; "port {} in use, using {} instead", requested, port);
        Ok(port)
    }
}

/// Extract `PORT` from dot-env content. Ignores comments, trims quotes.
fn parse_env_port(content: &str) -> Option<u16> {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "PORT" {
            continue;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        return value.parse().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator_with(dir: &Path, env: &[(&str, &str)]) -> PortAllocator {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PortAllocator::new(dir, env)
    }

    #[test]
    fn test_explicit_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator_with(dir.path(), &[("PORT", "9999")]);
        // Explicit beats the env snapshot (availability permitting)
        let port = allocator.requested_port(Some(4242));
        assert_eq!(port, 4242);
    }

    #[test]
    fn test_env_snapshot_beats_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "PORT=1111\n").unwrap();
        let allocator = allocator_with(dir.path(), &[("PORT", "2222")]);
        assert_eq!(allocator.requested_port(None), 2222);
    }

    #[test]
    fn test_env_file_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "PORT=1111\n").unwrap();
        std::fs::write(dir.path().join(".env.development"), "PORT=3334\n").unwrap();
        let allocator = allocator_with(dir.path(), &[]);
        // More specific file wins
        assert_eq!(allocator.requested_port(None), 3334);
    }

    #[test]
    fn test_default_port() {
        let dir = tempfile::tempdir().unwrap();
        let allocator = allocator_with(dir.path(), &[]);
        assert_eq!(allocator.requested_port(None), DEFAULT_PORT);
    }

    #[test]
    fn test_busy_port_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let busy = listener.local_addr().unwrap().port();

        let allocator = allocator_with(dir.path(), &[]);
        let port = allocator.allocate(Some(busy)).unwrap();
        assert_ne!(port, busy);
    }

    #[test]
    fn test_parse_env_port() {
        assert_eq!(parse_env_port("PORT=3333"), Some(3333));
        assert_eq!(parse_env_port("# PORT=1\nPORT = \"4000\""), Some(4000));
        assert_eq!(parse_env_port("HOST=0.0.0.0"), None);
        assert_eq!(parse_env_port("PORT=not-a-port"), None);
    }
}
