// src/commands/snapshots.rs
//! Safety snapshot inspection and pruning

use super::Context;
use anyhow::Result;
use botfleet::{BackupEngine, SnapshotInfo};

fn engine(ctx: &Context) -> BackupEngine {
    BackupEngine::new(ctx.config.preservation_set(), &ctx.config.paths.backup_dir)
}

/// List safety snapshots of one client, or of every registered client
pub fn cmd_snapshots_list(ctx: &Context, username: Option<&str>) -> Result<()> {
    let engine = engine(ctx);
    let usernames: Vec<String> = match username {
        Some(name) => vec![name.to_string()],
        None => ctx
            .load_registry()?
            .clients
            .into_iter()
            .map(|c| c.username)
            .collect(),
    };

    let mut total = 0;
    for name in &usernames {
        let snapshots = engine.list_snapshots(name)?;
        if snapshots.is_empty() {
            continue;
        }
        println!("{}:", name);
        for SnapshotInfo { stamp, path, .. } in &snapshots {
            println!("  {}  {}", stamp, path.display());
        }
        total += snapshots.len();
    }

    if total == 0 {
        println!("No safety snapshots found.");
    } else {
        println!("\nTotal: {} snapshot(s)", total);
    }
    Ok(())
}

/// Delete all but the newest `keep` safety snapshots of a client
pub fn cmd_snapshots_prune(ctx: &Context, username: &str, keep: usize) -> Result<()> {
    let removed = engine(ctx).prune_snapshots(username, keep)?;
    if removed.is_empty() {
        println!("Nothing to prune for {}.", username);
    } else {
        for path in &removed {
            println!("  removed {}", path.display());
        }
        println!("\nPruned {} snapshot(s) of {}", removed.len(), username);
    }
    Ok(())
}
