//! Shared utilities.
//!
//! - [`exec`]: external command execution (`Cmd` builder)
//! - [`path`]: path normalization for glob classification

pub mod exec;
pub mod path;
