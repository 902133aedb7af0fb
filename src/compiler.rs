//! TypeScript compilation collaborator.
//!
//! The bundler talks to a [`Compiler`] trait so tests can substitute a
//! stub; the default [`CommandCompiler`] shells out to the configured
//! compile command (`npx tsc` unless overridden).

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::Value;

use crate::config::ProjectConfig;
use crate::utils::exec::{Cmd, NPM_FILTER};

/// Result of one compile pass. Diagnostics are rendered through the
/// logger by the caller, never raised as errors.
#[derive(Debug, Default)]
pub struct CompileOutcome {
    pub success: bool,
    pub diagnostics: Vec<String>,
}

pub trait Compiler {
    fn compile(&self) -> Result<CompileOutcome>;
}

/// Runs the configured compile command in the project root.
pub struct CommandCompiler {
    command: Vec<String>,
    root: PathBuf,
}

impl CommandCompiler {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            command: config.build.compile_command.clone(),
            root: config.get_root().to_path_buf(),
        }
    }
}

impl Compiler for CommandCompiler {
    /// A failing compile (or an unrunnable compile command) is a failed
    /// outcome with the output as diagnostics, not an `Err`.
    fn compile(&self) -> Result<CompileOutcome> {
        match Cmd::from_slice(&self.command)
            .cwd(&self.root)
            .filter(&NPM_FILTER)
            .run()
        {
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Ok(CompileOutcome {
                    success: true,
                    diagnostics: stderr.lines().map(String::from).collect(),
                })
            }
            Err(err) => Ok(CompileOutcome {
                success: false,
                diagnostics: format!("{err:#}").lines().map(String::from).collect(),
            }),
        }
    }
}

// ============================================================================
// tsconfig reading
// ============================================================================

/// Read `compilerOptions.outDir` from the project's tsconfig.
///
/// tsconfig files are JSONC in practice (comments, trailing commas), so
/// the content is lightly scrubbed before parsing. Any failure just
/// yields `None`; the caller falls back to its default.
pub fn read_ts_out_dir(root: &Path, tsconfig: impl AsRef<Path>) -> Option<PathBuf> {
    let content = std::fs::read_to_string(root.join(tsconfig)).ok()?;
    let value: Value = serde_json::from_str(&strip_jsonc(&content)).ok()?;
    value
        .get("compilerOptions")?
        .get("outDir")?
        .as_str()
        .map(PathBuf::from)
}

/// Remove `//` and `/* */` comments plus trailing commas. String-aware
/// enough for real tsconfig files, nothing more.
fn strip_jsonc(content: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let mut out = String::with_capacity(content.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 2;
            }
            ',' => {
                // Trailing comma: drop if the next non-whitespace closes
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if !matches!(chars.get(j), Some('}') | Some(']')) {
                    out.push(c);
                }
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_jsonc_comments() {
        let input = r#"{
  // line comment
  "compilerOptions": {
    /* block
       comment */
    "outDir": "./build",
  },
}"#;
        let value: Value = serde_json::from_str(&strip_jsonc(input)).unwrap();
        assert_eq!(value["compilerOptions"]["outDir"], "./build");
    }

    #[test]
    fn test_strip_jsonc_preserves_strings() {
        let input = r#"{"a": "http://example.com", "b": "not // a comment"}"#;
        let value: Value = serde_json::from_str(&strip_jsonc(input)).unwrap();
        assert_eq!(value["a"], "http://example.com");
        assert_eq!(value["b"], "not // a comment");
    }

    #[test]
    fn test_read_ts_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "compilerOptions": { "outDir": "./dist", } }"#,
        )
        .unwrap();

        assert_eq!(
            read_ts_out_dir(dir.path(), "tsconfig.json"),
            Some(PathBuf::from("./dist"))
        );
        assert_eq!(read_ts_out_dir(dir.path(), "missing.json"), None);
    }

    #[test]
    fn test_failed_compile_is_outcome_not_error() {
        let compiler = CommandCompiler {
            command: vec!["false".into()],
            root: std::env::temp_dir(),
        };
        let outcome = compiler.compile().unwrap();
        assert!(!outcome.success);
    }

    #[test]
    fn test_successful_compile() {
        let compiler = CommandCompiler {
            command: vec!["true".into()],
            root: std::env::temp_dir(),
        };
        let outcome = compiler.compile().unwrap();
        assert!(outcome.success);
    }
}
