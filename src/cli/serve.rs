//! `serve` command entry.

use std::sync::Arc;

use anyhow::Result;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::config::ProjectConfig;
use crate::log;
use crate::watch::{DevOptions, DevSession, SessionExit};

pub struct ServeArgs {
    pub port: Option<u16>,
    pub watch: bool,
    pub clear: Option<bool>,
    pub env: FxHashMap<String, String>,
}

/// Run the dev-server session to completion; returns the process exit
/// code.
pub async fn run(
    config: Arc<ProjectConfig>,
    args: ServeArgs,
    shutdown: &mut mpsc::Receiver<()>,
) -> Result<i32> {
    log!("serve"; "starting {} ({})", config.serve.script, config.serve.runner);

    let options = DevOptions {
        watch: args.watch,
        explicit_port: args.port,
        clear_screen: args.clear,
        env: args.env,
    };

    let mut session = DevSession::new(config, options)?;
    let exit = session.run(shutdown).await?;

    if exit == SessionExit::Interrupted {
        log!("serve"; "shutting down");
    }
    Ok(exit.code())
}
