//! Path normalization utilities.
//!
//! Pure functions, no side effects. Glob classification runs exclusively on
//! project-relative, forward-slash paths; everything entering the classifier
//! goes through [`relative_unix_path`] first, on every platform.

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with the given root if relative
#[inline]
pub fn normalize_path(path: &Path, root: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    })
}

/// Reduce a path to its project-relative, forward-slash form.
///
/// Paths outside the project root are returned as-is (forward-slashed),
/// so out-of-tree events still classify deterministically as "no match".
pub fn relative_unix_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    to_unix_string(rel)
}

/// Convert path separators to forward slashes.
///
/// Backslash separators (Windows) must be translated before glob matching,
/// otherwise classification silently fails.
pub fn to_unix_string(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if raw.contains('\\') {
        raw.replace('\\', "/")
    } else {
        raw.into_owned()
    }
}

/// File name of a path as a `&str`, empty when absent or non-UTF-8.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
