//! forge - file-change-driven development workflow runner for
//! TypeScript server projects.

#![allow(dead_code)]

mod build;
mod cli;
mod compiler;
mod config;
mod logger;
mod run;
mod utils;
mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ProjectConfig;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    let mut shutdown_rx = setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = ProjectConfig::load(&cli.config)?;

    // CLI overrides that live in config
    if let Commands::Build {
        stop_on_error: Some(stop_on_error),
    } = &cli.command
    {
        config.build.stop_on_error = *stop_on_error;
    }
    let config = Arc::new(config);

    // Environment snapshot: captured once here, passed explicitly down.
    let env: FxHashMap<String, String> = std::env::vars().collect();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let code = runtime.block_on(async {
        match cli.command {
            Commands::Serve { port, watch, clear } => {
                let args = cli::serve::ServeArgs {
                    port,
                    watch: watch.unwrap_or(false),
                    clear,
                    env,
                };
                cli::serve::run(config, args, &mut shutdown_rx).await
            }
            Commands::Test {
                watch,
                files,
                suites,
            } => {
                let args = cli::test::TestArgs {
                    watch: watch.unwrap_or(false),
                    files,
                    suites,
                    env,
                };
                cli::test::run(config, args, &mut shutdown_rx).await
            }
            Commands::Build { .. } => cli::build::run(config),
        }
    })?;

    std::process::exit(code);
}

/// Install the Ctrl+C handler. The first signal is delivered to the
/// session for a graceful close; a second one while that is still
/// pending exits immediately.
fn setup_shutdown_handler() -> Result<mpsc::Receiver<()>> {
    use std::sync::atomic::{AtomicBool, Ordering};

    static SIGNALLED: AtomicBool = AtomicBool::new(false);

    let (ctrlc_tx, ctrlc_rx) = crossbeam::channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        if SIGNALLED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        let _ = ctrlc_tx.try_send(());
    })
    .context("failed to install Ctrl+C handler")?;

    // Bridge to the async side
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        while ctrlc_rx.recv().is_ok() {
            if tx.blocking_send(()).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
