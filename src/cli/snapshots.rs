// src/cli/snapshots.rs
//! Safety snapshot commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// List retained safety snapshots, newest first
    List {
        /// Only show snapshots of this client
        username: Option<String>,
    },

    /// Delete old safety snapshots of a client
    Prune {
        /// Client username
        username: String,

        /// Number of newest snapshots to keep
        #[arg(short, long, default_value = "3")]
        keep: usize,
    },
}
