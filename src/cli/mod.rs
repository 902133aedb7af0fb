//! Command-line interface.

pub mod args;
pub mod build;
pub mod serve;
pub mod test;

pub use args::{Cli, Commands};
