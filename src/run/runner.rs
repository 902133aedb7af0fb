//! Raw child-process spawning with stdio streaming.
//!
//! [`ProcessRunner`] owns exactly one spawned child plus the channel its
//! stdio reader tasks feed. The channel is created fresh for every spawn
//! and dropped with the runner, so a replaced child can never deliver
//! events into the new child's stream. Events carry the spawn generation
//! as an extra guard; stale generations are discarded on receipt.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::message::ProcessMessage;

// ============================================================================
// spawn specification
// ============================================================================

/// Everything needed to spawn one child process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Extra environment entries layered over the inherited environment.
    pub env: Vec<(String, String)>,
}

impl SpawnSpec {
    /// Spec for a script run through a runner program, in the usual
    /// `runner [runner_args] script [script_args]` shape.
    pub fn script(
        runner: &str,
        runner_args: &[String],
        script: &str,
        script_args: &[String],
        cwd: PathBuf,
    ) -> Self {
        let mut args = runner_args.to_vec();
        args.push(script.to_string());
        args.extend(script_args.iter().cloned());
        Self {
            program: runner.to_string(),
            args,
            cwd,
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

// ============================================================================
// child events
// ============================================================================

/// One event from a running child.
#[derive(Debug)]
pub enum ChildEvent {
    /// A structured JSON message from stdout. `raw` is the verbatim
    /// parsed value, for consumer hooks.
    Message { message: ProcessMessage, raw: Value },
    /// A plain (non-JSON) stdout line.
    Stdout(String),
    /// A stderr line.
    Stderr(String),
    /// The child exited. Emitted after all buffered output is drained.
    Exited(Option<i32>),
}

// ============================================================================
// runner
// ============================================================================

pub struct ProcessRunner {
    child: Child,
    generation: u64,
    events: mpsc::UnboundedReceiver<(u64, ChildEvent)>,
}

impl ProcessRunner {
    /// Spawn the child and start streaming its stdio.
    pub fn spawn(spec: &SpawnSpec, generation: u64) -> Result<Self> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", spec.program))?;

        let (tx, events) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_stdout(stdout, tx.clone(), generation));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_stderr(stderr, tx, generation));
        }

        Ok(Self {
            child,
            generation,
            events,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Next event from the current child.
    ///
    /// The reader tasks hold the only senders, so the channel closing
    /// means stdio hit EOF and every buffered line was delivered; only
    /// then is the exit status reported.
    pub async fn next_event(&mut self) -> ChildEvent {
        loop {
            match self.events.recv().await {
                Some((generation, event)) if generation == self.generation => return event,
                Some(_) => continue,
                None => {
                    let status = self.child.wait().await;
                    return ChildEvent::Exited(status.ok().and_then(|s| ExitStatus::code(&s)));
                }
            }
        }
    }

    /// SIGKILL the child and reap it. Tolerates an already-dead child.
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

// ============================================================================
// stdio readers
// ============================================================================

async fn read_stdout(
    stdout: impl AsyncRead + Unpin,
    tx: mpsc::UnboundedSender<(u64, ChildEvent)>,
    generation: u64,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let event = match ProcessMessage::parse_line(&line) {
            Some((message, raw)) => ChildEvent::Message { message, raw },
            None => ChildEvent::Stdout(line),
        };
        if tx.send((generation, event)).is_err() {
            break;
        }
    }
}

async fn read_stderr(
    stderr: impl AsyncRead + Unpin,
    tx: mpsc::UnboundedSender<(u64, ChildEvent)>,
    generation: u64,
) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send((generation, ChildEvent::Stderr(line))).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(command: &str) -> SpawnSpec {
        SpawnSpec {
            program: "sh".into(),
            args: vec!["-c".into(), command.into()],
            cwd: std::env::temp_dir(),
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_output_then_exit() {
        let mut runner = ProcessRunner::spawn(&shell("echo hello; exit 3"), 1).unwrap();

        let mut saw_hello = false;
        loop {
            match runner.next_event().await {
                ChildEvent::Stdout(line) => saw_hello = line == "hello",
                ChildEvent::Exited(code) => {
                    assert_eq!(code, Some(3));
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_hello);
    }

    #[tokio::test]
    async fn test_json_line_becomes_message() {
        let mut runner =
            ProcessRunner::spawn(&shell(r#"echo '{"type":"hot-hook:full-reload"}'"#), 1).unwrap();

        loop {
            match runner.next_event().await {
                ChildEvent::Message { message, .. } => {
                    assert!(matches!(message, ProcessMessage::HotReload { .. }));
                    break;
                }
                ChildEvent::Exited(_) => panic!("exited before message"),
                _ => {}
            }
        }
        runner.kill().await;
    }

    #[tokio::test]
    async fn test_kill_twice_is_fine() {
        let mut runner = ProcessRunner::spawn(&shell("sleep 30"), 1).unwrap();
        runner.kill().await;
        runner.kill().await;
    }

    #[tokio::test]
    async fn test_stderr_is_separated() {
        let mut runner = ProcessRunner::spawn(&shell("echo oops >&2"), 1).unwrap();

        let mut saw_stderr = false;
        loop {
            match runner.next_event().await {
                ChildEvent::Stderr(line) => saw_stderr = line == "oops",
                ChildEvent::Exited(_) => break,
                _ => {}
            }
        }
        assert!(saw_stderr);
    }
}
