// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, SnapshotCommands};
use commands::Context;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v / -q pick the level
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::load(cli.config.as_deref())?;

    match cli.command {
        Commands::List => commands::cmd_list(&ctx),
        Commands::Check => commands::cmd_check(&ctx),
        Commands::Update { username, force } => commands::cmd_update(&ctx, &username, force),
        Commands::UpdateAll { yes } => commands::cmd_update_all(&ctx, yes),
        Commands::BackupSessions => commands::cmd_backup_sessions(&ctx),
        Commands::Start { username } => commands::cmd_start(&ctx, &username),
        Commands::Stop { username } => commands::cmd_stop(&ctx, &username),
        Commands::Restart { username } => commands::cmd_restart(&ctx, &username),
        Commands::StartAll => commands::cmd_start_all(&ctx),
        Commands::StopAll { yes } => commands::cmd_stop_all(&ctx, yes),
        Commands::Logs { username, lines } => commands::cmd_logs(&ctx, &username, lines),
        Commands::Delete { username, yes } => commands::cmd_delete(&ctx, &username, yes),
        Commands::Snapshots(SnapshotCommands::List { username }) => {
            commands::cmd_snapshots_list(&ctx, username.as_deref())
        }
        Commands::Snapshots(SnapshotCommands::Prune { username, keep }) => {
            commands::cmd_snapshots_prune(&ctx, &username, keep)
        }
    }
}
