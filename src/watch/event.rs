//! Watch-event primitives: change kinds, the debouncer, and the final
//! [`WatchEvent`] delivered to the orchestrators.
//!
//! Pipeline:
//! ```text
//! notify → Debouncer (pure timing + dedup) → reconcile → WatchEvent
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use rustc_hash::FxHashMap;

/// Debounce configuration
const DEBOUNCE_MS: u64 = 300;
const RESTART_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Change types
// =============================================================================

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Event kind after the source/non-source split. Source events are for
/// files matching the configured source globs; everything else watched
/// in the project tree gets the plain kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    SourceAdd,
    SourceChange,
    SourceUnlink,
    Add,
    Change,
    Unlink,
}

impl WatchEventKind {
    pub fn from_change(kind: ChangeKind, is_source: bool) -> Self {
        match (kind, is_source) {
            (ChangeKind::Created, true) => Self::SourceAdd,
            (ChangeKind::Modified, true) => Self::SourceChange,
            (ChangeKind::Removed, true) => Self::SourceUnlink,
            (ChangeKind::Created, false) => Self::Add,
            (ChangeKind::Modified, false) => Self::Change,
            (ChangeKind::Removed, false) => Self::Unlink,
        }
    }

    pub fn is_source(self) -> bool {
        matches!(self, Self::SourceAdd | Self::SourceChange | Self::SourceUnlink)
    }

    pub fn is_unlink(self) -> bool {
        matches!(self, Self::SourceUnlink | Self::Unlink)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SourceAdd | Self::Add => "added",
            Self::SourceChange | Self::Change => "updated",
            Self::SourceUnlink | Self::Unlink => "removed",
        }
    }
}

/// A debounced, classified-by-source file event.
///
/// `path` is relative to the project root, forward slashes on every
/// platform; all downstream matching runs against this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: String,
}

// =============================================================================
// Temp-file filter
// =============================================================================

/// Editor artifacts that should never reach the orchestrators.
///
/// Deliberately narrower than a blanket dot-file filter: `.env` and its
/// variants are watched files here.
pub(crate) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

// =============================================================================
// Debouncer - Pure timing and event deduplication
// =============================================================================

/// Pure debouncer: only handles timing and event deduplication.
/// No business logic, no global state access.
pub(crate) struct Debouncer {
    /// Path → ChangeKind (dedup is free via HashMap key uniqueness)
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<std::time::Instant>,
    last_delivery: Option<std::time::Instant>,
}

impl Debouncer {
    pub(crate) fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            last_delivery: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Remove + Create/Modify → Create/Modify (file was restored)
    /// - Create/Modify + Remove → Remove (file was deleted)
    /// - Same type events: first event wins
    pub(crate) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Ignore metadata-only changes (mtime/atime/chmod noise)
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }

            if let Some(&existing) = self.changes.get(path) {
                // State transitions:
                // - Removed -> Created/Modified: restored, use new event
                // - Modified -> Removed: deleted, upgrade to Removed
                // - Created -> Removed: appeared then vanished, discard (no-op)
                // - otherwise: first event wins
                match (existing, kind) {
                    (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                        self.changes.insert(path.clone(), kind);
                    }
                    (ChangeKind::Modified, ChangeKind::Removed) => {
                        self.changes.insert(path.clone(), ChangeKind::Removed);
                    }
                    (ChangeKind::Created, ChangeKind::Removed) => {
                        self.changes.remove(path);
                    }
                    _ => {
                        // Same kind or other combos (Created+Modified, etc.) → first wins
                        continue;
                    }
                }
                self.last_event = Some(std::time::Instant::now());
                continue;
            }

            crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.changes.insert(path.clone(), kind);
            self.last_event = Some(std::time::Instant::now());
        }
    }

    /// Take raw events if debounce + cooldown elapsed.
    pub(crate) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }

        let mut changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        reconcile_with_fs(&mut changes);
        if changes.is_empty() {
            return None;
        }

        self.last_delivery = Some(std::time::Instant::now());
        Some(changes)
    }

    fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };

        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }

        if let Some(last_delivery) = self.last_delivery
            && last_delivery.elapsed() < Duration::from_millis(RESTART_COOLDOWN_MS)
        {
            return false;
        }

        !self.changes.is_empty()
    }

    /// Precise sleep duration until next possible ready time.
    pub(crate) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());

        let cooldown_remaining = self
            .last_delivery
            .map(|t| Duration::from_millis(RESTART_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .max(Duration::from_millis(1))
    }
}

/// Reconcile event kinds with actual filesystem state.
///
/// The watcher may report stale events (e.g., Created for a file that's
/// already been deleted, or Removed for a file that still exists after an
/// atomic save). Directories are dropped; only file events are actionable.
fn reconcile_with_fs(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
    let paths: Vec<_> = changes.keys().cloned().collect();
    for path in paths {
        let kind = changes[&path];
        if path.is_dir() {
            changes.remove(&path);
            continue;
        }
        let exists = path.exists();
        match kind {
            ChangeKind::Created if !exists => {
                changes.remove(&path);
            }
            ChangeKind::Modified if !exists => {
                changes.insert(path, ChangeKind::Removed);
            }
            ChangeKind::Removed if exists => {
                changes.insert(path, ChangeKind::Modified);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify_kind() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        ))
    }

    fn create_kind() -> notify::EventKind {
        notify::EventKind::Create(notify::event::CreateKind::File)
    }

    fn remove_kind() -> notify::EventKind {
        notify::EventKind::Remove(notify::event::RemoveKind::File)
    }

    #[test]
    fn test_debouncer_empty() {
        let debouncer = Debouncer::new();
        assert!(!debouncer.is_ready());
    }

    #[test]
    fn test_event_routing_by_kind() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/b.ts"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/c.ts"], remove_kind()));

        assert_eq!(debouncer.changes.len(), 3);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.ts")],
            ChangeKind::Created
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/b.ts")],
            ChangeKind::Modified
        );
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/c.ts")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_temp_file_ignored_but_dot_env_passes() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.ts.swp"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/backup~"], modify_kind()));
        assert!(debouncer.changes.is_empty());

        debouncer.add_event(&make_event(vec!["/tmp/.env"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/.env.local"], modify_kind()));
        assert_eq!(debouncer.changes.len(), 2);
    }

    #[test]
    fn test_dedup_first_event_wins() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], modify_kind()));

        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.ts")],
            ChangeKind::Created
        );
    }

    #[test]
    fn test_remove_then_create_restores() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], remove_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], create_kind()));
        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.ts")],
            ChangeKind::Created
        );
    }

    #[test]
    fn test_create_then_remove_discards() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], create_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], remove_kind()));
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_modify_then_remove_upgrades() {
        let mut debouncer = Debouncer::new();

        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/tmp/a.ts"], remove_kind()));
        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(
            debouncer.changes[&PathBuf::from("/tmp/a.ts")],
            ChangeKind::Removed
        );
    }

    #[test]
    fn test_sleep_duration_no_events() {
        let debouncer = Debouncer::new();
        assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
    }

    #[test]
    fn test_sleep_duration_after_event() {
        let mut debouncer = Debouncer::new();
        debouncer.last_event = Some(std::time::Instant::now());

        let dur = debouncer.sleep_duration();
        assert!(dur >= Duration::from_millis(DEBOUNCE_MS - 10));
        assert!(dur <= Duration::from_millis(DEBOUNCE_MS + 10));
    }

    #[test]
    fn test_sleep_duration_respects_cooldown() {
        let mut debouncer = Debouncer::new();
        debouncer.last_event = Some(std::time::Instant::now());
        debouncer.last_delivery = Some(std::time::Instant::now());

        let dur = debouncer.sleep_duration();
        assert!(dur >= Duration::from_millis(RESTART_COOLDOWN_MS - 10));
        assert!(dur <= Duration::from_millis(RESTART_COOLDOWN_MS + 10));
    }

    #[test]
    fn test_event_kind_split() {
        assert_eq!(
            WatchEventKind::from_change(ChangeKind::Created, true),
            WatchEventKind::SourceAdd
        );
        assert_eq!(
            WatchEventKind::from_change(ChangeKind::Removed, false),
            WatchEventKind::Unlink
        );
        assert!(WatchEventKind::SourceUnlink.is_source());
        assert!(WatchEventKind::SourceUnlink.is_unlink());
        assert!(!WatchEventKind::Change.is_source());
    }
}
