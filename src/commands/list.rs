// src/commands/list.rs
//! Client listing

use super::Context;
use anyhow::Result;
use botfleet::external::Pm2Supervisor;
use botfleet::version::local_version;
use botfleet::ProcessSupervisor;

/// Show every registered client with its process status and version
pub fn cmd_list(ctx: &Context) -> Result<()> {
    let registry = ctx.load_registry()?;
    if registry.is_empty() {
        println!("No clients registered.");
        return Ok(());
    }

    let supervisor = Pm2Supervisor::new(ctx.config.timeouts.supervisor());
    let clients_dir = &ctx.config.paths.clients_dir;

    println!(
        "{:<16} {:<8} {:<12} {:<20} DIRECTORY",
        "USERNAME", "STATUS", "VERSION", "CREATED"
    );
    for client in &registry.clients {
        let status = supervisor.status(&client.username);
        let version = if client.directory.is_dir() {
            local_version(&client.directory).to_string()
        } else {
            "missing".to_string()
        };
        // Directories under the usual clients root are shown relative to it
        let directory = client
            .directory
            .strip_prefix(clients_dir)
            .unwrap_or(&client.directory);

        println!(
            "{:<16} {:<8} {:<12} {:<20} {}",
            client.username,
            status.to_string(),
            version,
            client.created_at.format("%Y-%m-%d %H:%M"),
            directory.display()
        );
    }
    println!("\nTotal: {} client(s)", registry.len());

    Ok(())
}
