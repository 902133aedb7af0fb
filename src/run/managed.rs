//! Restart semantics on top of [`ProcessRunner`].
//!
//! A [`ManagedProcess`] moves through
//! `Idle -> Starting -> Running <-> Restarting -> Closed` and guarantees
//! at most one live child at any time: every (re)start kills the previous
//! child and reaps it before spawning the replacement.

use anyhow::Result;
use serde_json::Value;

use super::message::{HotReloadKind, ProcessMessage};
use super::runner::{ChildEvent, ProcessRunner, SpawnSpec};
use crate::{debug, log};

/// Hook invoked with the verbatim JSON value of every structured message.
pub type MessageHook = Box<dyn Fn(&Value) + Send>;

/// How child exits are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Exits are logged and the process goes back to `Idle`; the session
    /// keeps running and the next change respawns it. Watch mode.
    Blocking,
    /// An exit ends the session; the exit code propagates out.
    NonBlocking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Starting,
    Running,
    Restarting,
    Closed,
}

/// Significant events surfaced to the orchestrator. Plain output and
/// informational messages are handled internally.
#[derive(Debug)]
pub enum ManagedEvent {
    /// The child announced it is serving.
    Ready {
        environment: String,
        port: u16,
        host: String,
        duration: Option<[u64; 2]>,
    },
    /// The child's module graph requires a full restart.
    FullReload { paths: Vec<String> },
    /// The child exited. State has already moved to `Idle`.
    Exited { code: Option<i32> },
}

pub struct ManagedProcess {
    /// Log prefix, e.g. `serve` or `test`.
    name: &'static str,
    spec: SpawnSpec,
    mode: RunMode,
    state: ProcessState,
    generation: u64,
    runner: Option<ProcessRunner>,
    hook: Option<MessageHook>,
}

impl ManagedProcess {
    pub fn new(name: &'static str, spec: SpawnSpec) -> Self {
        Self {
            name,
            spec,
            mode: RunMode::Blocking,
            state: ProcessState::Idle,
            generation: 0,
            runner: None,
            hook: None,
        }
    }

    /// Register a hook that receives every structured message verbatim.
    pub fn on_message(&mut self, hook: MessageHook) {
        self.hook = Some(hook);
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Starting | ProcessState::Running)
    }

    pub fn id(&self) -> Option<u32> {
        self.runner.as_ref().and_then(ProcessRunner::id)
    }

    /// Spawn the child.
    ///
    /// In `Blocking` mode a spawn failure is logged and the process stays
    /// `Idle` so the session keeps watching; in `NonBlocking` mode the
    /// error propagates.
    pub fn start(&mut self, mode: RunMode) -> Result<()> {
        if self.state == ProcessState::Closed {
            return Ok(());
        }

        self.mode = mode;
        self.state = ProcessState::Starting;
        self.generation += 1;

        match ProcessRunner::spawn(&self.spec, self.generation) {
            Ok(runner) => {
                debug!(self.name; "spawned pid {:?} (generation {})", runner.id(), self.generation);
                self.runner = Some(runner);
                Ok(())
            }
            Err(err) if mode == RunMode::Blocking => {
                log!("error"; "{err:#}");
                self.state = ProcessState::Idle;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Kill the current child (if any), then spawn a fresh one.
    ///
    /// Safe to call when nothing is running; a no-op once `Closed`.
    pub async fn restart(&mut self) -> Result<()> {
        if self.state == ProcessState::Closed {
            return Ok(());
        }

        if let Some(mut runner) = self.runner.take() {
            self.state = ProcessState::Restarting;
            runner.kill().await;
        }
        self.start(self.mode)
    }

    /// Next significant event. Pends forever while no child is running,
    /// which makes this safe to park inside a `select!`.
    pub async fn next_event(&mut self) -> ManagedEvent {
        loop {
            let Some(runner) = self.runner.as_mut() else {
                std::future::pending::<()>().await;
                unreachable!();
            };

            match runner.next_event().await {
                ChildEvent::Message { message, raw } => {
                    if let Some(hook) = &self.hook {
                        hook(&raw);
                    }
                    match message {
                        ProcessMessage::Ready {
                            environment,
                            port,
                            host,
                            duration,
                        } => {
                            self.state = ProcessState::Running;
                            return ManagedEvent::Ready {
                                environment,
                                port,
                                host,
                                duration,
                            };
                        }
                        ProcessMessage::HotReload {
                            kind: HotReloadKind::FullReload,
                            paths,
                        } => return ManagedEvent::FullReload { paths },
                        ProcessMessage::HotReload {
                            kind: HotReloadKind::Invalidated,
                            paths,
                        } => {
                            debug!(self.name; "hot reloaded: {}", paths.join(", "));
                        }
                        ProcessMessage::Unrecognized(_) => {}
                    }
                }
                ChildEvent::Stdout(line) => println!("{line}"),
                ChildEvent::Stderr(line) => eprintln!("{line}"),
                ChildEvent::Exited(code) => {
                    self.runner = None;
                    if self.state != ProcessState::Closed {
                        self.state = ProcessState::Idle;
                    }
                    if self.mode == RunMode::Blocking {
                        log!(self.name; "process exited (code {:?}), waiting for file changes", code);
                    }
                    return ManagedEvent::Exited { code };
                }
            }
        }
    }

    /// Kill the child and refuse further starts. Tolerant of an
    /// already-dead child; safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut runner) = self.runner.take() {
            runner.kill().await;
        }
        self.state = ProcessState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shell_process(command: &str) -> ManagedProcess {
        let spec = SpawnSpec {
            program: "sh".into(),
            args: vec!["-c".into(), command.into()],
            cwd: std::env::temp_dir(),
            env: Vec::new(),
        };
        ManagedProcess::new("test", spec)
    }

    #[tokio::test]
    async fn test_start_then_close() {
        let mut process = shell_process("sleep 30");
        process.start(RunMode::Blocking).unwrap();
        assert_eq!(process.state(), ProcessState::Starting);
        assert!(process.id().is_some());

        process.close().await;
        assert_eq!(process.state(), ProcessState::Closed);
        assert!(process.id().is_none());
    }

    #[tokio::test]
    async fn test_restart_replaces_child() {
        let mut process = shell_process("sleep 30");
        process.start(RunMode::Blocking).unwrap();
        let first = process.id().unwrap();

        process.restart().await.unwrap();
        let second = process.id().unwrap();
        assert_ne!(first, second);

        // Back-to-back restarts still leave exactly one child
        process.restart().await.unwrap();
        process.restart().await.unwrap();
        assert!(process.id().is_some());

        process.close().await;
    }

    #[tokio::test]
    async fn test_restart_when_idle_spawns() {
        let mut process = shell_process("sleep 30");
        assert_eq!(process.state(), ProcessState::Idle);
        process.restart().await.unwrap();
        assert!(process.is_running());
        process.close().await;
    }

    #[tokio::test]
    async fn test_restart_after_close_is_ignored() {
        let mut process = shell_process("sleep 30");
        process.start(RunMode::Blocking).unwrap();
        process.close().await;

        process.restart().await.unwrap();
        assert_eq!(process.state(), ProcessState::Closed);
        assert!(process.id().is_none());
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let mut process = shell_process("exit 7");
        process.start(RunMode::NonBlocking).unwrap();

        loop {
            if let ManagedEvent::Exited { code } = process.next_event().await {
                assert_eq!(code, Some(7));
                break;
            }
        }
        assert_eq!(process.state(), ProcessState::Idle);
    }

    #[tokio::test]
    async fn test_ready_message_sets_running() {
        let mut process = shell_process(
            r#"echo '{"isAdonisJS":true,"environment":"web","port":3333,"host":"0.0.0.0"}'; sleep 30"#,
        );
        process.start(RunMode::Blocking).unwrap();

        match process.next_event().await {
            ManagedEvent::Ready { port, host, .. } => {
                assert_eq!(port, 3333);
                assert_eq!(host, "0.0.0.0");
            }
            other => panic!("expected Ready, got {other:?}"),
        }
        assert_eq!(process.state(), ProcessState::Running);
        process.close().await;
    }

    #[tokio::test]
    async fn test_hook_fires_for_every_message() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);

        let mut process = shell_process(
            r#"echo '{"custom":1}'; echo '{"type":"hot-hook:invalidated","paths":[]}'; echo plain"#,
        );
        process.on_message(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        process.start(RunMode::NonBlocking).unwrap();

        loop {
            if let ManagedEvent::Exited { .. } = process.next_event().await {
                break;
            }
        }
        // Both JSON objects, but not the plain line
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_reload_surfaces() {
        let mut process =
            shell_process(r#"echo '{"type":"hot-hook:full-reload","path":"app/x.ts"}'; sleep 30"#);
        process.start(RunMode::Blocking).unwrap();

        match process.next_event().await {
            ManagedEvent::FullReload { paths } => assert_eq!(paths, vec!["app/x.ts"]),
            other => panic!("expected FullReload, got {other:?}"),
        }
        process.close().await;
    }
}
