//! `test` command entry.

use std::sync::Arc;

use anyhow::Result;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::config::ProjectConfig;
use crate::log;
use crate::watch::{SessionExit, TestOptions, TestSession};

pub struct TestArgs {
    pub watch: bool,
    pub files: Vec<String>,
    pub suites: Vec<String>,
    pub env: FxHashMap<String, String>,
}

/// Run the test session to completion; returns the process exit code.
pub async fn run(
    config: Arc<ProjectConfig>,
    args: TestArgs,
    shutdown: &mut mpsc::Receiver<()>,
) -> Result<i32> {
    // Unknown suite names are a config error, not a silent no-op
    for suite in &args.suites {
        if !config.tests.suites.iter().any(|s| &s.name == suite) {
            anyhow::bail!("unknown test suite '{suite}'");
        }
    }

    log!("test"; "running {} ({})", config.tests.script, config.tests.runner);

    let options = TestOptions {
        watch: args.watch,
        files: args.files,
        suites: args.suites,
        env: args.env,
    };

    let mut session = TestSession::new(config, options)?;
    let exit = session.run(shutdown).await?;

    if exit == SessionExit::Interrupted {
        log!("test"; "shutting down");
    }
    Ok(exit.code())
}
