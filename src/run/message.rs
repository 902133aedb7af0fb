//! IPC messages emitted by the managed child on stdout.
//!
//! The child writes one JSON object per line for structured messages;
//! anything that does not parse as a JSON object is treated as plain
//! output and streamed through untouched.
//!
//! Two shapes are recognized:
//!
//! - server-ready announcements, discriminated by `isAdonisJS: true`
//! - hot-reload notifications, discriminated by a `type` field with a
//!   `hot-hook:` prefix
//!
//! Everything else (including unknown `hot-hook:*` subtypes) is kept as
//! [`ProcessMessage::Unrecognized`] so consumers can still observe it.

use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// message types
// ============================================================================

/// Hot-reload notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotReloadKind {
    /// The module graph cannot be patched in place; a restart is required.
    FullReload,
    /// Modules were invalidated and re-imported in place. Informational.
    Invalidated,
}

/// A structured message parsed from a child stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessMessage {
    /// Server announced it is listening.
    Ready {
        environment: String,
        port: u16,
        host: String,
        /// Startup duration as `[seconds, nanos]`, when reported.
        duration: Option<[u64; 2]>,
    },

    /// Hot-reload notification from the module-graph hook.
    HotReload {
        kind: HotReloadKind,
        /// Affected file paths, when reported.
        paths: Vec<String>,
    },

    /// Any other JSON message, kept verbatim.
    Unrecognized(Value),
}

// Wire shape of the ready announcement.
#[derive(Deserialize)]
struct ReadyPayload {
    environment: Option<String>,
    port: u16,
    host: Option<String>,
    duration: Option<[u64; 2]>,
}

impl ProcessMessage {
    /// Parse one stdout line. Returns `None` when the line is not a JSON
    /// object, meaning it should be streamed through as plain output.
    pub fn parse_line(line: &str) -> Option<(Self, Value)> {
        let value: Value = serde_json::from_str(line.trim()).ok()?;
        if !value.is_object() {
            return None;
        }
        let message = Self::from_value(&value);
        Some((message, value))
    }

    /// Classify an already-parsed JSON object.
    pub fn from_value(value: &Value) -> Self {
        if value.get("isAdonisJS").and_then(Value::as_bool) == Some(true) {
            if let Ok(ready) = ReadyPayload::deserialize(value) {
                return Self::Ready {
                    environment: ready.environment.unwrap_or_else(|| "unknown".into()),
                    port: ready.port,
                    host: ready.host.unwrap_or_else(|| "127.0.0.1".into()),
                    duration: ready.duration,
                };
            }
            return Self::Unrecognized(value.clone());
        }

        if let Some(kind) = value.get("type").and_then(Value::as_str) {
            let hot_kind = match kind {
                "hot-hook:full-reload" => Some(HotReloadKind::FullReload),
                "hot-hook:invalidated" => Some(HotReloadKind::Invalidated),
                _ => None,
            };
            if let Some(kind) = hot_kind {
                return Self::HotReload {
                    kind,
                    paths: reload_paths(value),
                };
            }
        }

        Self::Unrecognized(value.clone())
    }
}

/// Collect affected paths from either `path` or `paths`.
fn reload_paths(value: &Value) -> Vec<String> {
    if let Some(path) = value.get("path").and_then(Value::as_str) {
        return vec![path.to_string()];
    }
    value
        .get("paths")
        .and_then(Value::as_array)
        .map(|paths| {
            paths
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Host shown in the ready banner. A wildcard bind address is not a
/// browsable URL, so remap it to loopback for display only.
pub fn display_host(host: &str) -> &str {
    if host == "0.0.0.0" { "127.0.0.1" } else { host }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ProcessMessage {
        ProcessMessage::parse_line(line).expect("should be a JSON object").0
    }

    #[test]
    fn test_ready_message() {
        let msg = parse(
            r#"{"isAdonisJS": true, "environment": "web", "port": 3333, "host": "0.0.0.0", "duration": [0, 843000000]}"#,
        );
        assert_eq!(
            msg,
            ProcessMessage::Ready {
                environment: "web".into(),
                port: 3333,
                host: "0.0.0.0".into(),
                duration: Some([0, 843000000]),
            }
        );
    }

    #[test]
    fn test_ready_without_port_is_unrecognized() {
        let msg = parse(r#"{"isAdonisJS": true, "environment": "web"}"#);
        assert!(matches!(msg, ProcessMessage::Unrecognized(_)));
    }

    #[test]
    fn test_full_reload() {
        let msg = parse(r#"{"type": "hot-hook:full-reload", "path": "/app/config/app.ts"}"#);
        assert_eq!(
            msg,
            ProcessMessage::HotReload {
                kind: HotReloadKind::FullReload,
                paths: vec!["/app/config/app.ts".into()],
            }
        );
    }

    #[test]
    fn test_invalidated_with_paths() {
        let msg = parse(r#"{"type": "hot-hook:invalidated", "paths": ["a.ts", "b.ts"]}"#);
        assert_eq!(
            msg,
            ProcessMessage::HotReload {
                kind: HotReloadKind::Invalidated,
                paths: vec!["a.ts".into(), "b.ts".into()],
            }
        );
    }

    #[test]
    fn test_unknown_hot_hook_subtype() {
        let msg = parse(r#"{"type": "hot-hook:future-thing"}"#);
        assert!(matches!(msg, ProcessMessage::Unrecognized(_)));
    }

    #[test]
    fn test_arbitrary_object_is_unrecognized() {
        let msg = parse(r#"{"custom": "payload"}"#);
        assert!(matches!(msg, ProcessMessage::Unrecognized(_)));
    }

    #[test]
    fn test_plain_output_is_not_a_message() {
        assert!(ProcessMessage::parse_line("server listening on 3333").is_none());
        assert!(ProcessMessage::parse_line("[1, 2, 3]").is_none());
        assert!(ProcessMessage::parse_line("42").is_none());
    }
}
