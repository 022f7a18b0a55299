// src/cli/mod.rs
//! CLI definitions for botfleet
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `list` - Show registered clients
//! - `check` - Compare client versions with the source
//! - `update` - Update a single client
//! - `update-all` - Update every client, one at a time
//! - `backup-sessions` - Copy every client's session files
//! - `start` / `stop` / `restart` - Control one client's process
//! - `start-all` / `stop-all` - Control every client's process
//! - `logs` - Show a client's recent log output
//! - `delete` - Remove a client and its directory
//! - `snapshots` - Inspect and prune safety snapshots

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod snapshots;

pub use snapshots::SnapshotCommands;

#[derive(Parser)]
#[command(name = "botfleet")]
#[command(author = "Botfleet Contributors")]
#[command(version)]
#[command(about = "Update and roll back a fleet of bot clients", long_about = None)]
pub struct Cli {
    /// Fleet configuration file [default: $BOTFLEET_CONFIG or /etc/botfleet/fleet.toml]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered clients with their status and version
    List,

    /// Check which clients are behind the source version
    Check,

    /// Update a single client
    Update {
        /// Client username
        username: String,

        /// Update even when the client already runs the latest version
        #[arg(short, long)]
        force: bool,
    },

    /// Update every registered client
    UpdateAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Back up session files of every client
    BackupSessions,

    /// Start a client under the process supervisor
    Start {
        /// Client username
        username: String,
    },

    /// Stop a client
    Stop {
        /// Client username
        username: String,
    },

    /// Restart a client
    Restart {
        /// Client username
        username: String,
    },

    /// Start every client that is not already running
    StartAll,

    /// Stop every client
    StopAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show recent log output of a client
    Logs {
        /// Client username
        username: String,

        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "100")]
        lines: usize,
    },

    /// Remove a client, its process entry and its directory
    Delete {
        /// Client username
        username: String,

        /// Skip typing the username to confirm
        #[arg(short, long)]
        yes: bool,
    },

    /// Safety snapshot management
    #[command(subcommand)]
    Snapshots(SnapshotCommands),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update() {
        let cli = Cli::try_parse_from(["botfleet", "-v", "update", "alice", "--force"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Update { ref username, force: true } if username == "alice"
        ));
    }

    #[test]
    fn test_parse_prune() {
        let cli =
            Cli::try_parse_from(["botfleet", "snapshots", "prune", "bob", "--keep", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Snapshots(SnapshotCommands::Prune { keep: 2, .. })
        ));
    }

    #[test]
    fn test_parse_process_control() {
        let cli = Cli::try_parse_from(["botfleet", "logs", "carol", "-n", "20"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Logs { ref username, lines: 20 } if username == "carol"
        ));

        let cli = Cli::try_parse_from(["botfleet", "logs", "carol"]).unwrap();
        assert!(matches!(cli.command, Commands::Logs { lines: 100, .. }));

        let cli = Cli::try_parse_from(["botfleet", "delete", "carol", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { yes: true, .. }));

        let cli = Cli::try_parse_from(["botfleet", "stop-all"]).unwrap();
        assert!(matches!(cli.command, Commands::StopAll { yes: false }));

        assert!(Cli::try_parse_from(["botfleet", "start"]).is_err());
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["botfleet", "-v", "-q", "list"]).is_err());
    }
}
