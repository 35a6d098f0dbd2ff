//! Command-line interface definitions for flatmirror.
//!
//! This module contains all CLI argument parsing structures using clap's derive macros.
//! The CLI definitions are shared between the main binary and build tools (like xtask)
//! for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes (#[arg(help = "...")]),
//! so we allow missing_docs for this module to avoid redundant documentation.

#![allow(missing_docs)]

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for flatmirror.
#[derive(Parser)]
#[command(
    name = "flatmirror",
    version = crate::VERSION,
    about = "Mirror a source tree into one flat directory, live",
    long_about = "Watches a source tree and keeps a flattened, collision-free copy of selected \
                  files in a single directory, along with a structure listing and the recent \
                  commit log"
)]
pub struct Cli {
    /// Subcommand to execute (defaults to `watch`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file
    #[arg(short, long, global = true, env = "FLATMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source root to mirror
    #[arg(short, long, global = true)]
    pub source: Option<PathBuf>,

    /// Destination directory
    #[arg(short, long, global = true)]
    pub dest: Option<PathBuf>,

    /// Show verbose output (repeat for debug logging)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress informational messages
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Mirror the source tree, then keep mirroring changes until Ctrl-C
    Watch,

    /// Rebuild the destination once and exit
    Scan,

    /// Show the configured roots and what a scan would produce
    Status {
        /// List every source file with its flattened name
        #[arg(short, long)]
        list: bool,
    },

    /// Get and set configuration options
    Config {
        /// Configuration key
        key: Option<String>,

        /// Configuration value to set
        value: Option<String>,

        /// Unset the configuration key
        #[arg(long)]
        unset: bool,

        /// List all configuration values
        #[arg(short, long)]
        list: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["flatmirror"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["flatmirror", "scan", "-vv", "--source", "site"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Scan)));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.source, Some(PathBuf::from("site")));
    }
}
