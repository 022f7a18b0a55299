// src/commands/sessions.rs
//! Fleet-wide session backup

use super::Context;
use anyhow::Result;
use botfleet::FleetOrchestrator;

pub fn cmd_backup_sessions(ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry()?;
    let fleet = FleetOrchestrator::from_config(&ctx.config)?;

    let report = fleet.backup_sessions(&registry, ctx.registry.path())?;

    for (username, items) in &report.per_client {
        if items.is_empty() {
            println!("  {}: nothing to back up", username);
        } else {
            println!("  {}: {}", username, items.join(", "));
        }
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    if report.registry_copied {
        println!("  registry copied");
    }
    println!("\nSessions backed up to {}", report.location.display());

    Ok(())
}
