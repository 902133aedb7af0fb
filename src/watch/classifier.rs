//! File classification for watch events.
//!
//! Decides what a changed path means for the session: a root config
//! file, a meta file, a meta file that should also restart the server,
//! or nothing at all. Patterns are compiled once at session start and
//! matched against relative forward-slash paths only.

use anyhow::Result;

use crate::config::ProjectConfig;
use crate::utils::path::file_name;

/// Outcome of classifying one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileClassification {
    /// The root config file itself.
    pub is_rc_file: bool,
    /// Matches one of the configured meta globs.
    pub is_meta_file: bool,
    /// Should restart the managed process.
    pub triggers_reload: bool,
}

pub struct FileClassifier {
    rc_name: String,
    /// Meta globs marked `reload_server = true`, in config order.
    reload: Vec<glob::Pattern>,
    /// All meta globs, in config order.
    meta: Vec<glob::Pattern>,
}

impl FileClassifier {
    pub fn new(config: &ProjectConfig) -> Result<Self> {
        let mut reload = Vec::new();
        let mut meta = Vec::new();
        for entry in &config.meta {
            let pattern = glob::Pattern::new(&entry.pattern)?;
            if entry.reload_server {
                reload.push(pattern.clone());
            }
            meta.push(pattern);
        }

        Ok(Self {
            rc_name: config.rc_file_name(),
            reload,
            meta,
        })
    }

    /// Classify a relative unix path.
    ///
    /// Precedence: rc file, then reload-marked meta globs, then plain
    /// meta globs. First hit wins.
    pub fn classify(&self, path: &str) -> FileClassification {
        if path == self.rc_name {
            return FileClassification {
                is_rc_file: true,
                is_meta_file: true,
                triggers_reload: true,
            };
        }

        if self.reload.iter().any(|p| p.matches(path)) {
            return FileClassification {
                is_rc_file: false,
                is_meta_file: true,
                triggers_reload: true,
            };
        }

        if self.meta.iter().any(|p| p.matches(path)) {
            return FileClassification {
                is_rc_file: false,
                is_meta_file: true,
                triggers_reload: false,
            };
        }

        FileClassification::default()
    }
}

/// Is this path a dot-env file? Matches `.env` exactly plus any variant
/// with a suffix (`.env.local`, `.env.production.local`). Files merely
/// starting with `.env` (`.env-backup`) do not count. Dot-env changes
/// always restart the managed process, independent of the meta globs.
pub fn is_dot_env_file(path: &str) -> bool {
    let name = file_name(path);
    name == ".env" || name.contains(".env.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    fn classifier(toml: &str) -> FileClassifier {
        let mut config = test_parse_config(toml);
        config.config_path = std::path::PathBuf::from("/proj/forge.toml");
        FileClassifier::new(&config).unwrap()
    }

    #[test]
    fn test_rc_file_wins() {
        let classifier = classifier("[[meta]]\npattern = \"*.toml\"");
        let result = classifier.classify("forge.toml");
        assert!(result.is_rc_file);
        assert!(result.is_meta_file);
        assert!(result.triggers_reload);
    }

    #[test]
    fn test_reload_marked_meta_glob() {
        let classifier = classifier("[[meta]]\npattern = \"public/**\"\nreload_server = true");
        let result = classifier.classify("public/app.css");
        assert_eq!(
            result,
            FileClassification {
                is_rc_file: false,
                is_meta_file: true,
                triggers_reload: true,
            }
        );
    }

    #[test]
    fn test_plain_meta_glob() {
        let classifier = classifier("[[meta]]\npattern = \"resources/views/**\"");
        let result = classifier.classify("resources/views/welcome.edge");
        assert!(result.is_meta_file);
        assert!(!result.triggers_reload);
    }

    #[test]
    fn test_reload_beats_plain_on_overlap() {
        let classifier = classifier(
            "[[meta]]\npattern = \"config/**\"\n\n[[meta]]\npattern = \"config/app.json\"\nreload_server = true",
        );
        assert!(classifier.classify("config/app.json").triggers_reload);
        assert!(!classifier.classify("config/other.json").triggers_reload);
    }

    #[test]
    fn test_unmatched_path() {
        let classifier = classifier("[[meta]]\npattern = \"public/**\"");
        assert_eq!(classifier.classify("README.md"), FileClassification::default());
    }

    #[test]
    fn test_dot_env_variants() {
        assert!(is_dot_env_file(".env"));
        assert!(is_dot_env_file(".env.local"));
        assert!(is_dot_env_file(".env.production.local"));
        assert!(is_dot_env_file("apps/web/.env.test"));
        assert!(!is_dot_env_file(".env-backup"));
        assert!(!is_dot_env_file(".environment"));
        assert!(!is_dot_env_file("env"));
    }
}
