//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Development workflow runner for TypeScript server projects
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: forge.toml)
    #[arg(short = 'C', long, global = true, default_value = "forge.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP dev server
    #[command(visible_alias = "s")]
    Serve {
        /// Port number to serve on (overrides config and env)
        #[arg(short, long)]
        port: Option<u16>,

        /// Restart the server on file changes
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,

        /// Clear the terminal before each restart
        #[arg(long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        clear: Option<bool>,
    },

    /// Run the test suite
    #[command(visible_alias = "t")]
    Test {
        /// Re-run tests on file changes
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,

        /// Filter test files (substring match, repeatable)
        #[arg(short, long)]
        files: Vec<String>,

        /// Suites to run (all configured suites when omitted)
        suites: Vec<String>,
    },

    /// Create the production bundle
    #[command(visible_alias = "b")]
    Build {
        /// Abort the bundle when compilation fails
        #[arg(long = "stop-on-error", action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        stop_on_error: Option<bool>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::parse_from(["forge", "serve", "--watch", "--port", "4000"]);
        match cli.command {
            Commands::Serve { port, watch, clear } => {
                assert_eq!(port, Some(4000));
                assert_eq!(watch, Some(true));
                assert_eq!(clear, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_bool_flag_accepts_value() {
        let cli = Cli::parse_from(["forge", "serve", "--watch=false"]);
        match cli.command {
            Commands::Serve { watch, .. } => assert_eq!(watch, Some(false)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_test_filters_and_suites() {
        let cli = Cli::parse_from(["forge", "test", "-f", "user", "unit", "functional"]);
        match cli.command {
            Commands::Test { files, suites, .. } => {
                assert_eq!(files, vec!["user"]);
                assert_eq!(suites, vec!["unit", "functional"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["forge", "build", "-C", "custom.toml"]);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
    }
}
