// src/commands/control.rs
//! Process control: start, stop, restart, logs and delete

use super::{confirm, prompt, Context};
use anyhow::{bail, Context as _, Result};
use botfleet::external::Pm2Supervisor;
use botfleet::{Client, ClientControl, ControlReport, Registry};

fn find_client<'a>(registry: &'a Registry, username: &str) -> Result<&'a Client> {
    match registry.find(username) {
        Some(client) => Ok(client),
        None => bail!("Client '{}' is not registered", username),
    }
}

pub fn cmd_start(ctx: &Context, username: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let client = find_client(&registry, username)?;

    ClientControl::from_config(&ctx.config)
        .start(client)
        .with_context(|| format!("Failed to start {}", username))?;
    println!("{} started. View its output with: botfleet logs {}", username, username);
    Ok(())
}

pub fn cmd_stop(ctx: &Context, username: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let client = find_client(&registry, username)?;

    ClientControl::from_config(&ctx.config)
        .stop(client)
        .with_context(|| format!("Failed to stop {}", username))?;
    println!("{} stopped.", username);
    Ok(())
}

pub fn cmd_restart(ctx: &Context, username: &str) -> Result<()> {
    let registry = ctx.load_registry()?;
    let client = find_client(&registry, username)?;

    ClientControl::from_config(&ctx.config)
        .restart(client)
        .with_context(|| format!("Failed to restart {}", username))?;
    println!("{} restarted.", username);
    Ok(())
}

pub fn cmd_start_all(ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry()?;
    if registry.is_empty() {
        println!("No clients registered.");
        return Ok(());
    }

    let report = ClientControl::from_config(&ctx.config).start_all(&registry);
    print_control_report(&report);
    if report.failed() > 0 {
        bail!("{} client(s) could not be started", report.failed());
    }
    Ok(())
}

pub fn cmd_stop_all(ctx: &Context, yes: bool) -> Result<()> {
    let registry = ctx.load_registry()?;
    if registry.is_empty() {
        println!("No clients registered.");
        return Ok(());
    }

    if !yes && !confirm(&format!("Stop all {} client(s)?", registry.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    let report = ClientControl::from_config(&ctx.config).stop_all(&registry);
    print_control_report(&report);
    if report.failed() > 0 {
        bail!("{} client(s) could not be stopped", report.failed());
    }
    Ok(())
}

pub fn cmd_logs(ctx: &Context, username: &str, lines: usize) -> Result<()> {
    let registry = ctx.load_registry()?;
    find_client(&registry, username)?;

    let supervisor = Pm2Supervisor::new(ctx.config.timeouts.supervisor());
    let output = supervisor
        .logs(username, lines)
        .with_context(|| format!("Failed to read logs of {}", username))?;
    print!("{}", output);
    Ok(())
}

pub fn cmd_delete(ctx: &Context, username: &str, yes: bool) -> Result<()> {
    let registry = ctx.load_registry()?;
    let client = find_client(&registry, username)?;

    if !yes {
        println!(
            "This removes {} and everything in {}, including its session.",
            username,
            client.directory.display()
        );
        let answer = prompt(&format!("Type '{}' to confirm:", username))?;
        if answer != username {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let report = ClientControl::from_config(&ctx.config)
        .delete(&ctx.registry, username)
        .with_context(|| format!("Failed to delete {}", username))?;

    for warning in &report.warnings {
        println!("  Warning: {}", warning);
    }
    if !report.directory_removed {
        println!("  Directory {} was already gone", report.directory.display());
    }
    println!("{} deleted.", report.username);
    Ok(())
}

fn print_control_report(report: &ControlReport) {
    for (username, action) in &report.per_client {
        println!("  {:<16} {}", username, action);
    }
    if let Some(warning) = &report.persist_warning {
        println!("\nWarning: could not save process list: {}", warning);
    }
}
