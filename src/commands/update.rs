// src/commands/update.rs
//! Single-client and fleet updates

use super::{confirm, Context};
use anyhow::{bail, Result};
use botfleet::fleet::ClientRun;
use botfleet::{
    CliProgress, Error, FleetOrchestrator, LogProgress, ProgressTracker, UpdateOutcome,
    UpdateReport, VersionStatus,
};
use std::sync::Arc;
use tracing::info;

/// Update one client
pub fn cmd_update(ctx: &Context, username: &str, force: bool) -> Result<()> {
    let registry = ctx.load_registry()?;
    let Some(client) = registry.find(username) else {
        bail!("Client '{}' is not registered", username);
    };

    let fleet = FleetOrchestrator::from_config(&ctx.config)?
        .with_progress(Arc::new(LogProgress::new("update")));

    if !force {
        let local = fleet.versions().local_version(&client.directory);
        let remote = fleet.versions().remote_version(&ctx.config.source_url);
        if VersionStatus::of(&local, &remote) == VersionStatus::UpToDate {
            println!(
                "{} is already at {}, nothing to do (use --force to update anyway)",
                username, local
            );
            return Ok(());
        }
    }

    let report = fleet.update_one(&registry, username)?;
    if report.outcome == UpdateOutcome::ClientNotFound {
        return Err(Error::ClientNotFound {
            username: username.to_string(),
            directory: client.directory.clone(),
        }
        .into());
    }
    print_report(&report);

    if !report.success() {
        bail!("Update of '{}' did not complete: {}", username, report.outcome);
    }
    Ok(())
}

/// Update every registered client
pub fn cmd_update_all(ctx: &Context, yes: bool) -> Result<()> {
    let registry = ctx.load_registry()?;
    if registry.is_empty() {
        println!("No clients registered.");
        return Ok(());
    }

    if !yes && !confirm(&format!("Update all {} client(s)?", registry.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    let progress = Arc::new(CliProgress::new("Updating", registry.len() as u64));
    let fleet = FleetOrchestrator::from_config(&ctx.config)?.with_progress(progress.clone());

    let report = fleet.update_all(&registry);
    if report.failed == 0 {
        progress.finish_with_message("done");
    } else {
        progress.finish_with_error(&format!("{} failed", report.failed));
    }

    println!();
    for run in &report.per_client {
        match run {
            ClientRun::Completed(update) => print_summary_line(update),
            ClientRun::Faulted { username, error } => {
                println!("  [FAULT] {}: {}", username, error);
            }
        }
    }
    for run in &report.per_client {
        if let ClientRun::Completed(update) = run
            && update.is_corrupted()
        {
            print_corrupted_banner(update);
        }
    }
    if let Some(warning) = &report.persist_warning {
        println!("\nWarning: could not save process list: {}", warning);
    }

    println!("\nSucceeded: {}  Failed: {}", report.succeeded, report.failed);
    info!("update-all: {} succeeded, {} failed", report.succeeded, report.failed);

    if report.failed > 0 {
        bail!("{} client(s) failed to update", report.failed);
    }
    Ok(())
}

fn print_report(report: &UpdateReport) {
    println!("Client:   {}", report.username);
    println!("Outcome:  {}", report.outcome);
    println!(
        "Version:  {} -> {}",
        report.previous_version, report.new_version
    );
    if !report.preserved.is_empty() {
        println!("Preserved: {}", report.preserved.join(", "));
    }
    if let Some(snapshot) = &report.safety_snapshot {
        println!("Safety snapshot: {}", snapshot.display());
    }
    if !report.warnings.is_empty() {
        println!("Warnings:");
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }
    if let UpdateOutcome::Recovered { .. } = report.outcome
        && report.was_running
    {
        println!(
            "\n{} was restored but left stopped. Start it manually once the source is reachable.",
            report.username
        );
    }
    if report.is_corrupted() {
        print_corrupted_banner(report);
    }
}

fn print_summary_line(report: &UpdateReport) {
    let tag = match &report.outcome {
        UpdateOutcome::Updated => "OK",
        UpdateOutcome::Recovered { .. } => "ROLLED BACK",
        UpdateOutcome::Corrupted { .. } => "CORRUPTED",
        UpdateOutcome::ClientNotFound => "MISSING",
    };
    let warnings = if report.warnings.is_empty() {
        String::new()
    } else {
        format!(" ({} warning(s))", report.warnings.len())
    };
    println!(
        "  [{}] {}: {} -> {}{}",
        tag, report.username, report.previous_version, report.new_version, warnings
    );
}

fn print_corrupted_banner(report: &UpdateReport) {
    let rule = "!".repeat(72);
    eprintln!("\n{rule}");
    eprintln!("!! CLIENT '{}' IS CORRUPTED", report.username);
    eprintln!("!! {}", report.outcome);
    eprintln!("!! Its directory may be missing or incomplete.");
    if let Some(preserved) = &report.retained_preserve {
        eprintln!("!! Preserved session files kept at {}", preserved.display());
    }
    eprintln!("{rule}");
}
