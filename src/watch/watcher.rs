//! Filesystem watcher session.
//!
//! Wraps notify with the watcher-first pattern: the watcher is created
//! and armed before the managed child starts, so changes made during
//! startup buffer in the channel instead of being lost. Raw notify
//! events flow through a sync→async bridge into the [`Debouncer`] and
//! come out as batches of [`WatchEvent`]s.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use super::event::{ChangeKind, Debouncer, WatchEvent, WatchEventKind};
use crate::config::ProjectConfig;
use crate::utils::path::{normalize_path, relative_unix_path};

pub struct WatchSession {
    /// Watcher handle (must be kept alive)
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    debouncer: Debouncer,
    root: PathBuf,
    sources: Vec<glob::Pattern>,
    ignore: Vec<glob::Pattern>,
}

impl WatchSession {
    /// Create the session and start watching the project root
    /// immediately. Events buffer until the first `next_batch` call.
    pub fn new(config: &ProjectConfig) -> Result<Self> {
        // Canonical root so notify paths strip cleanly (macOS reports
        // /private/tmp for a /tmp root)
        let root = config
            .get_root()
            .canonicalize()
            .unwrap_or_else(|_| config.get_root().to_path_buf());

        let sources = compile_globs(&config.build.sources)?;
        let ignore = compile_globs(&config.build.ignore)?;

        // notify's callback is sync; bridge into tokio via a std channel
        // drained by a dedicated thread.
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .context("failed to create filesystem watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", root.display()))?;

        let (tx, rx) = mpsc::channel(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                if tx.blocking_send(result).is_err() {
                    break; // Receiver dropped
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            rx,
            debouncer: Debouncer::new(),
            root,
            sources,
            ignore,
        })
    }

    /// Session over an injected event channel, bypassing notify.
    #[cfg(test)]
    pub(crate) fn with_channel(
        config: &ProjectConfig,
        rx: mpsc::Receiver<notify::Result<notify::Event>>,
    ) -> Result<Self> {
        let watcher = notify::recommended_watcher(|_: notify::Result<notify::Event>| {})
            .context("failed to create filesystem watcher")?;
        Ok(Self {
            _watcher: watcher,
            rx,
            debouncer: Debouncer::new(),
            root: config.get_root().to_path_buf(),
            sources: compile_globs(&config.build.sources)?,
            ignore: compile_globs(&config.build.ignore)?,
        })
    }

    /// Next debounced batch of events. An `Err` means the watcher backend
    /// failed and the session cannot continue.
    pub async fn next_batch(&mut self) -> Result<Vec<WatchEvent>> {
        loop {
            tokio::select! {
                biased;
                received = self.rx.recv() => match received {
                    Some(Ok(event)) => self.debouncer.add_event(&event),
                    Some(Err(err)) => return Err(anyhow!(err).context("filesystem watcher failed")),
                    None => return Err(anyhow!("filesystem watcher channel closed")),
                },
                _ = tokio::time::sleep(self.debouncer.sleep_duration()) => {
                    if let Some(changes) = self.debouncer.take_if_ready() {
                        let events =
                            convert_changes(changes, &self.root, &self.sources, &self.ignore);
                        if !events.is_empty() {
                            return Ok(events);
                        }
                    }
                }
            }
        }
    }
}

/// `next_batch` over an optional session: pends forever when there is
/// no watcher, so a `select!` arm on it simply never fires.
pub(crate) async fn next_batch_opt(
    watcher: &mut Option<WatchSession>,
) -> Result<Vec<WatchEvent>> {
    match watcher {
        Some(watcher) => watcher.next_batch().await,
        None => std::future::pending().await,
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid glob '{p}'")))
        .collect()
}

/// Turn raw debounced changes into relative-path watch events.
///
/// Ignored paths are dropped; the rest are split into source and
/// non-source kinds by the configured source globs. Output order is
/// deterministic (sorted by path).
fn convert_changes(
    changes: FxHashMap<PathBuf, ChangeKind>,
    root: &std::path::Path,
    sources: &[glob::Pattern],
    ignore: &[glob::Pattern],
) -> Vec<WatchEvent> {
    let mut events: Vec<WatchEvent> = changes
        .into_iter()
        .filter_map(|(path, kind)| {
            let rel = relative_unix_path(&normalize_path(&path, root), root);
            if rel.is_empty() || ignore.iter().any(|p| p.matches(&rel)) {
                return None;
            }
            let is_source = sources.iter().any(|p| p.matches(&rel));
            Some(WatchEvent {
                kind: WatchEventKind::from_change(kind, is_source),
                path: rel,
            })
        })
        .collect();

    events.sort_by(|a, b| a.path.cmp(&b.path));
    events
}
