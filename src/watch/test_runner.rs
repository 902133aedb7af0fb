//! Test session: run the test script, then re-run on file changes.
//!
//! Differences from the dev-server session:
//! - runs are finite; while one is in flight every watch event is
//!   silently dropped (at most one concurrent run, no queue)
//! - a changed file matching an active suite glob narrows the re-run to
//!   just that file; other source changes re-run with the original
//!   filters

use std::sync::Arc;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use super::classifier::{FileClassifier, is_dot_env_file};
use super::dev::SessionExit;
use super::event::WatchEvent;
use super::watcher::{WatchSession, next_batch_opt};
use crate::config::ProjectConfig;
use crate::run::{ManagedEvent, ManagedProcess, PortAllocator, RunMode, SpawnSpec};
use crate::{debug, log, logger};

/// Options resolved by the CLI layer.
pub struct TestOptions {
    pub watch: bool,
    /// `--files` filters passed through to the runner.
    pub files: Vec<String>,
    /// Suite names to run; empty means all configured suites.
    pub suites: Vec<String>,
    pub env: FxHashMap<String, String>,
}

// ============================================================================
// re-run planning (pure)
// ============================================================================

/// What a batch of events means for the next test run.
#[derive(Debug, PartialEq)]
pub(crate) enum RerunPlan {
    /// Re-run only the listed files.
    Narrowed(Vec<String>),
    /// Re-run with the original CLI filters.
    Full,
    /// Nothing test-related changed.
    Skip,
    /// Root config file deleted; close the session.
    CloseConfigDeleted,
}

/// Substring filter the way test runners treat `--files`: empty filter
/// list accepts everything.
fn passes_file_filters(path: &str, filters: &[String]) -> bool {
    filters.is_empty() || filters.iter().any(|f| path.contains(f.as_str()))
}

pub(crate) fn plan_rerun(
    events: &[WatchEvent],
    classifier: &FileClassifier,
    suite_globs: &[glob::Pattern],
    file_filters: &[String],
) -> RerunPlan {
    let mut narrowed = Vec::new();
    let mut full = false;

    for event in events {
        let class = classifier.classify(&event.path);

        if class.is_rc_file && event.kind.is_unlink() {
            return RerunPlan::CloseConfigDeleted;
        }

        if event.kind.is_source() {
            let in_suite = suite_globs.iter().any(|p| p.matches(&event.path));
            if in_suite {
                // Deleted test files can't be run on their own
                if event.kind.is_unlink() {
                    full = true;
                } else if passes_file_filters(&event.path, file_filters) {
                    narrowed.push(event.path.clone());
                }
                // filtered-out test file: not part of this session
            } else {
                full = true;
            }
            continue;
        }

        if class.triggers_reload || is_dot_env_file(&event.path) {
            full = true;
        }
        // plain meta / unmatched: no re-run
    }

    if full {
        RerunPlan::Full
    } else if !narrowed.is_empty() {
        RerunPlan::Narrowed(narrowed)
    } else {
        RerunPlan::Skip
    }
}

// ============================================================================
// test session
// ============================================================================

/// One iteration of the in-flight-run loop; computed inside a `select!`
/// so the handlers below can borrow `self` freely.
enum Tick {
    Shutdown,
    Child(ManagedEvent),
    Fs(Result<Vec<WatchEvent>>),
}

pub struct TestSession {
    config: Arc<ProjectConfig>,
    classifier: FileClassifier,
    watcher: Option<WatchSession>,
    options: TestOptions,
    /// Globs of the active suites, compiled once.
    suite_globs: Vec<glob::Pattern>,
    /// Session port, allocated once and injected into every run.
    port: u16,
}

impl TestSession {
    pub fn new(config: Arc<ProjectConfig>, options: TestOptions) -> Result<Self> {
        let watcher = if options.watch {
            Some(WatchSession::new(&config)?)
        } else {
            None
        };
        let classifier = FileClassifier::new(&config)?;

        let mut suite_globs = Vec::new();
        for suite in &config.tests.suites {
            if !options.suites.is_empty() && !options.suites.contains(&suite.name) {
                continue;
            }
            for files in &suite.files {
                suite_globs.push(
                    glob::Pattern::new(files)
                        .with_context(|| format!("invalid suite glob '{files}'"))?,
                );
            }
        }

        // Functional suites boot an HTTP server; they get a session port
        // the same way the dev server does.
        let allocator = PortAllocator::new(config.get_root(), options.env.clone());
        let port = allocator.allocate(None)?;

        Ok(Self {
            config,
            classifier,
            watcher,
            options,
            suite_globs,
            port,
        })
    }

    /// Run once, or loop forever in watch mode.
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<SessionExit> {
        let mut filters: Option<Vec<String>> = None;

        loop {
            let code = match self.run_once(filters.take(), shutdown).await? {
                Some(code) => code,
                // Interrupted mid-run
                None => {
                    self.close().await;
                    return Ok(SessionExit::Interrupted);
                }
            };

            if self.watcher.is_none() {
                return Ok(SessionExit::Completed(code));
            }

            if code == Some(0) {
                logger::status_success("tests passed, waiting for file changes");
            } else {
                logger::status_error("tests failed, waiting for file changes", "");
            }

            // Idle until something warrants a re-run
            loop {
                let tick = {
                    let watcher = self.watcher.as_mut().context("watcher missing")?;
                    tokio::select! {
                        _ = shutdown.recv() => None,
                        batch = watcher.next_batch() => Some(batch),
                    }
                };

                let Some(batch) = tick else {
                    self.close().await;
                    return Ok(SessionExit::Interrupted);
                };

                let events = match batch {
                    Ok(events) => events,
                    Err(err) => {
                        log!("error"; "{err:#}");
                        self.close().await;
                        return Err(err);
                    }
                };

                match plan_rerun(
                    &events,
                    &self.classifier,
                    &self.suite_globs,
                    &self.options.files,
                ) {
                    RerunPlan::CloseConfigDeleted => {
                        log!("test"; "{} deleted, shutting down", self.config.rc_file_name());
                        self.close().await;
                        return Ok(SessionExit::ConfigDeleted);
                    }
                    RerunPlan::Narrowed(files) => {
                        for file in &files {
                            log!("watch"; "re-running: {file}");
                        }
                        filters = Some(files);
                        break;
                    }
                    RerunPlan::Full => {
                        log!("watch"; "re-running all tests");
                        filters = None;
                        break;
                    }
                    RerunPlan::Skip => {}
                }
            }
        }
    }

    /// One test run. Watch events arriving while the run is in flight
    /// are drained and dropped; a watcher failure aborts the run and the
    /// session. Returns `Ok(None)` on shutdown.
    async fn run_once(
        &mut self,
        filters: Option<Vec<String>>,
        shutdown: &mut mpsc::Receiver<()>,
    ) -> Result<Option<Option<i32>>> {
        let spec = self.spawn_spec(filters.as_deref());
        let mut process = ManagedProcess::new("test", spec);
        process.start(RunMode::NonBlocking)?;

        loop {
            let tick = {
                let watcher = &mut self.watcher;
                tokio::select! {
                    _ = shutdown.recv() => Tick::Shutdown,
                    event = process.next_event() => Tick::Child(event),
                    batch = next_batch_opt(watcher) => Tick::Fs(batch),
                }
            };

            match tick {
                Tick::Shutdown => {
                    process.close().await;
                    return Ok(None);
                }
                Tick::Child(event) => {
                    if let ManagedEvent::Exited { code } = event {
                        return Ok(Some(code));
                    }
                }
                // Busy: at most one run in flight, no queueing
                Tick::Fs(Ok(events)) => {
                    debug!("test"; "run in progress, dropped {} event(s)", events.len());
                }
                Tick::Fs(Err(err)) => {
                    log!("error"; "{err:#}");
                    process.close().await;
                    self.close().await;
                    return Err(err);
                }
            }
        }
    }

    /// Build the spawn spec for one run. Narrowed filters replace the
    /// CLI `--files` filters; suite names always pass through. Every run
    /// inherits the session port.
    fn spawn_spec(&self, narrowed: Option<&[String]>) -> SpawnSpec {
        let tests = &self.config.tests;
        let mut script_args: Vec<String> = self.options.suites.clone();

        let files: &[String] = match narrowed {
            Some(files) => files,
            None => &self.options.files,
        };
        if !files.is_empty() {
            script_args.push(format!("--files={}", files.join(",")));
        }

        let mut spec = SpawnSpec::script(
            &tests.runner,
            &tests.node_args,
            &tests.script,
            &script_args,
            self.config.get_root().to_path_buf(),
        )
        .env("PORT", self.port.to_string());
        for (key, value) in &self.options.env {
            spec = spec.env(key.clone(), value.clone());
        }
        spec
    }

    async fn close(&mut self) {
        self.watcher = None;
    }
}
