//! Dev-server session: watch → classify → restart.
//!
//! Owns the managed HTTP server process, the filesystem watcher and the
//! optional assets dev server. The watcher is armed before the first
//! child spawn so changes made during startup are not lost.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use super::classifier::{FileClassifier, is_dot_env_file};
use super::event::WatchEvent;
use super::watcher::{WatchSession, next_batch_opt};
use crate::config::ProjectConfig;
use crate::run::message::display_host;
use crate::run::{ManagedEvent, ManagedProcess, PortAllocator, RunMode, SpawnSpec};
use crate::{debug, log, logger};

// ============================================================================
// session plumbing
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    NotStarted,
    Watching,
    Closed,
}

/// Why a session ended.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionExit {
    /// The managed child exited (non-blocking mode).
    Completed(Option<i32>),
    /// The root config file was deleted out from under the session.
    ConfigDeleted,
    /// Ctrl-C / shutdown signal.
    Interrupted,
}

impl SessionExit {
    /// Process exit code for this session outcome.
    pub fn code(&self) -> i32 {
        match self {
            Self::Completed(code) => code.unwrap_or(1),
            Self::ConfigDeleted => 1,
            Self::Interrupted => 0,
        }
    }
}

/// Options resolved by the CLI layer. The environment snapshot is
/// captured once at startup; nothing below the CLI reads ambient env.
pub struct DevOptions {
    pub watch: bool,
    pub explicit_port: Option<u16>,
    pub clear_screen: Option<bool>,
    pub env: FxHashMap<String, String>,
}

// ============================================================================
// batch planning (pure)
// ============================================================================

/// What a batch of watch events amounts to.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct BatchPlan {
    /// Root config file was deleted; the session must close.
    pub close_config_deleted: bool,
    /// Paths that warrant a restart, in event order.
    pub restart: Vec<String>,
    /// One of the restart paths matched the manifest watch globs.
    pub regen_manifest: bool,
    /// Meta files that only get logged.
    pub meta_only: Vec<String>,
}

impl BatchPlan {
    pub(crate) fn wants_restart(&self) -> bool {
        !self.restart.is_empty()
    }
}

/// Fold a batch of events into one plan.
///
/// Per event: rc-file unlink closes the session; source events and
/// reload-marked meta/dot-env changes restart; plain meta changes are
/// log-only; everything else is ignored.
pub(crate) fn plan_batch(
    events: &[WatchEvent],
    classifier: &FileClassifier,
    manifest_globs: &[glob::Pattern],
    manifest_enabled: bool,
) -> BatchPlan {
    let mut plan = BatchPlan::default();

    for event in events {
        let class = classifier.classify(&event.path);

        if class.is_rc_file && event.kind.is_unlink() {
            plan.close_config_deleted = true;
            continue;
        }

        if event.kind.is_source() {
            if manifest_enabled && manifest_globs.iter().any(|p| p.matches(&event.path)) {
                plan.regen_manifest = true;
            }
            plan.restart.push(event.path.clone());
            continue;
        }

        if class.triggers_reload || is_dot_env_file(&event.path) {
            plan.restart.push(event.path.clone());
        } else if class.is_meta_file {
            plan.meta_only.push(event.path.clone());
        }
        // anything else: silent
    }

    plan
}

// ============================================================================
// assets dev server
// ============================================================================

/// The assets bundler's own dev server (e.g. vite), run side by side
/// with inherited stdio. Not restarted on file changes; the bundler has
/// its own watcher.
struct AssetsServer {
    child: Option<tokio::process::Child>,
}

impl AssetsServer {
    fn start(command: &[String], root: &Path) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .context("assets serve_command is empty")?;
        let child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(root)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start assets dev server `{program}`"))?;
        log!("assets"; "dev server started ({})", command.join(" "));
        Ok(Self { child: Some(child) })
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

// ============================================================================
// dev session
// ============================================================================

/// One iteration of the session loop; computed inside a `select!` so
/// the handlers below can borrow `self` freely.
enum Tick {
    Shutdown,
    Child(ManagedEvent),
    Fs(Result<Vec<WatchEvent>>),
}

pub struct DevSession {
    config: Arc<ProjectConfig>,
    classifier: FileClassifier,
    manifest_globs: Vec<glob::Pattern>,
    watcher: Option<WatchSession>,
    server: ManagedProcess,
    assets: Option<AssetsServer>,
    state: SessionState,
    clear_screen: bool,
}

impl DevSession {
    /// Build the session: watcher first, then port allocation, then the
    /// (not yet started) managed server.
    pub fn new(config: Arc<ProjectConfig>, options: DevOptions) -> Result<Self> {
        let watcher = if options.watch {
            Some(WatchSession::new(&config)?)
        } else {
            None
        };

        let classifier = FileClassifier::new(&config)?;
        let manifest_globs = config
            .manifest
            .watch
            .iter()
            .map(|p| glob::Pattern::new(p).with_context(|| format!("invalid manifest glob '{p}'")))
            .collect::<Result<Vec<_>>>()?;

        let allocator = PortAllocator::new(config.get_root(), options.env.clone());
        let port = allocator.allocate(options.explicit_port.or(config.serve.port))?;

        let serve = &config.serve;
        let mut spec = SpawnSpec::script(
            &serve.runner,
            &serve.node_args,
            &serve.script,
            &serve.script_args,
            config.get_root().to_path_buf(),
        )
        .env("PORT", port.to_string());
        if let Some(host) = &serve.host {
            spec = spec.env("HOST", host.clone());
        }
        for (key, value) in &serve.env {
            spec = spec.env(key.clone(), value.clone());
        }

        let clear_screen = options.clear_screen.unwrap_or(serve.clear_screen);

        let mut server = ManagedProcess::new("serve", spec);
        server.on_message(Box::new(|raw| {
            debug!("serve"; "child message: {raw}");
        }));

        Ok(Self {
            config,
            classifier,
            manifest_globs,
            watcher,
            server,
            assets: None,
            state: SessionState::NotStarted,
            clear_screen,
        })
    }

    /// Run until the child exits (non-watch), the config file is deleted,
    /// the watcher fails, or a shutdown signal arrives.
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<SessionExit> {
        let mode = if self.watcher.is_some() {
            RunMode::Blocking
        } else {
            RunMode::NonBlocking
        };

        self.server.start(mode)?;
        self.state = SessionState::Watching;

        if self.config.assets.has_dev_server() {
            self.assets = Some(AssetsServer::start(
                &self.config.assets.serve_command,
                self.config.get_root(),
            )?);
        }

        if self.watcher.is_some() {
            log!("watch"; "watching for file changes");
        }

        loop {
            let tick = {
                let server = &mut self.server;
                let watcher = &mut self.watcher;
                tokio::select! {
                    _ = shutdown.recv() => Tick::Shutdown,
                    event = server.next_event() => Tick::Child(event),
                    batch = next_batch_opt(watcher) => Tick::Fs(batch),
                }
            };

            match tick {
                Tick::Shutdown => {
                    self.close().await;
                    return Ok(SessionExit::Interrupted);
                }
                Tick::Child(event) => {
                    if let Some(exit) = self.on_child_event(event, mode).await? {
                        return Ok(exit);
                    }
                }
                Tick::Fs(batch) => {
                    let batch = match batch {
                        Ok(batch) => batch,
                        Err(err) => {
                            log!("error"; "{err:#}");
                            self.close().await;
                            return Err(err);
                        }
                    };
                    if let Some(exit) = self.on_batch(batch).await? {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    async fn on_child_event(
        &mut self,
        event: ManagedEvent,
        mode: RunMode,
    ) -> Result<Option<SessionExit>> {
        match event {
            ManagedEvent::Ready {
                environment,
                port,
                host,
                duration,
            } => {
                let took = duration
                    .map(|[secs, nanos]| {
                        format!(" ({}ms)", secs * 1000 + u64::from(nanos) / 1_000_000)
                    })
                    .unwrap_or_default();
                logger::status_success(&format!(
                    "{environment} server ready on http://{}:{port}{took}",
                    display_host(&host)
                ));
            }
            ManagedEvent::FullReload { paths } => {
                debug!("serve"; "full reload requested: {}", paths.join(", "));
                self.restart(&paths).await?;
            }
            ManagedEvent::Exited { code } => {
                if mode == RunMode::NonBlocking {
                    self.close().await;
                    return Ok(Some(SessionExit::Completed(code)));
                }
                // Blocking: logged by the managed process, keep watching
            }
        }
        Ok(None)
    }

    async fn on_batch(&mut self, events: Vec<WatchEvent>) -> Result<Option<SessionExit>> {
        if self.state != SessionState::Watching {
            return Ok(None);
        }

        for event in &events {
            debug!("watch"; "{}: {}", event.kind.label(), event.path);
        }

        let plan = plan_batch(
            &events,
            &self.classifier,
            &self.manifest_globs,
            self.config.manifest.is_enabled(),
        );

        if plan.close_config_deleted {
            log!("serve"; "{} deleted, shutting down", self.config.rc_file_name());
            self.close().await;
            return Ok(Some(SessionExit::ConfigDeleted));
        }

        if plan.wants_restart() {
            if plan.regen_manifest {
                self.regenerate_manifest().await;
            }
            self.restart(&plan.restart).await?;
        }

        for path in &plan.meta_only {
            log!("watch"; "changed (no restart): {path}");
        }

        Ok(None)
    }

    async fn restart(&mut self, paths: &[String]) -> Result<()> {
        if self.clear_screen {
            logger::clear_screen();
        }
        for path in paths {
            log!("watch"; "restarting: {path}");
        }
        self.server.restart().await
    }

    /// Run the configured manifest regeneration command, best effort.
    async fn regenerate_manifest(&self) {
        let Some((program, args)) = self.config.manifest.command.split_first() else {
            return;
        };
        debug!("serve"; "regenerating manifest");
        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(self.config.get_root())
            .status()
            .await;
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => log!("error"; "manifest command failed with {status}"),
            Err(err) => log!("error"; "manifest command failed: {err}"),
        }
    }

    /// Tear everything down: watcher, assets server, managed child.
    /// Each step tolerates being already stopped.
    pub async fn close(&mut self) {
        self.watcher = None;
        if let Some(assets) = &mut self.assets {
            assets.stop().await;
        }
        self.server.close().await;
        self.state = SessionState::Closed;
    }
}
