//! `build` command entry.

use std::sync::Arc;

use anyhow::Result;

use crate::build::Bundler;
use crate::compiler::CommandCompiler;
use crate::config::ProjectConfig;

/// Create the production bundle; returns the process exit code.
pub fn run(config: Arc<ProjectConfig>) -> Result<i32> {
    let compiler = CommandCompiler::new(&config);
    let bundled = Bundler::new(config, compiler).bundle()?;
    Ok(if bundled { 0 } else { 1 })
}
