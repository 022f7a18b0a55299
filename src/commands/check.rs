// src/commands/check.rs
//! Version check across the fleet

use super::Context;
use anyhow::Result;
use botfleet::{FleetOrchestrator, VersionStatus};

/// Compare each client's version with the source and list candidates
pub fn cmd_check(ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry()?;
    let fleet = FleetOrchestrator::from_config(&ctx.config)?;

    let check = fleet.check_updates(&registry);
    println!("Source: {}", ctx.config.source_url);
    if check.remote_version.is_unknown() {
        println!("Remote version: unknown (manifest unreachable)");
    } else {
        println!("Remote version: {}", check.remote_version);
    }

    if check.clients.is_empty() {
        println!("\nNo clients registered.");
        return Ok(());
    }

    println!();
    for client in &check.clients {
        let marker = match client.status {
            VersionStatus::UpToDate => " ",
            VersionStatus::UpdateAvailable => "*",
            VersionStatus::Ambiguous => "?",
        };
        println!(
            "{} {:<16} {:<12} {}",
            marker, client.username, client.local_version, client.status
        );
    }

    let candidates = FleetOrchestrator::update_candidates(&check);
    let ambiguous = candidates
        .iter()
        .filter(|c| c.status == VersionStatus::Ambiguous)
        .count();
    println!(
        "\n{} of {} client(s) need attention ({} could not be compared)",
        candidates.len(),
        check.clients.len(),
        ambiguous
    );

    Ok(())
}
