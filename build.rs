// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn username_arg() -> Arg {
    Arg::new("username").required(true).help("Client username")
}

fn build_cli() -> Command {
    Command::new("botfleet")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Botfleet Contributors")
        .about("Update and roll back a fleet of bot clients")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help(
                    "Fleet configuration file [default: $BOTFLEET_CONFIG or /etc/botfleet/fleet.toml]",
                ),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Show debug output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Only show warnings and errors"),
        )
        .subcommand(
            Command::new("list").about("List registered clients with their status and version"),
        )
        .subcommand(
            Command::new("check").about("Check which clients are behind the source version"),
        )
        .subcommand(
            Command::new("update")
                .about("Update a single client")
                .arg(username_arg())
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Update even when the client already runs the latest version"),
                ),
        )
        .subcommand(
            Command::new("update-all")
                .about("Update every registered client")
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Skip the confirmation prompt"),
                ),
        )
        .subcommand(Command::new("backup-sessions").about("Back up session files of every client"))
        .subcommand(
            Command::new("start")
                .about("Start a client under the process supervisor")
                .arg(username_arg()),
        )
        .subcommand(Command::new("stop").about("Stop a client").arg(username_arg()))
        .subcommand(Command::new("restart").about("Restart a client").arg(username_arg()))
        .subcommand(Command::new("start-all").about("Start every client that is not already running"))
        .subcommand(
            Command::new("stop-all").about("Stop every client").arg(
                Arg::new("yes")
                    .short('y')
                    .long("yes")
                    .action(ArgAction::SetTrue)
                    .help("Skip the confirmation prompt"),
            ),
        )
        .subcommand(
            Command::new("logs")
                .about("Show recent log output of a client")
                .arg(username_arg())
                .arg(
                    Arg::new("lines")
                        .short('n')
                        .long("lines")
                        .default_value("100")
                        .help("Number of lines to show"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Remove a client, its process entry and its directory")
                .arg(username_arg())
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Skip typing the username to confirm"),
                ),
        )
        .subcommand(
            Command::new("snapshots")
                .about("Safety snapshot management")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("List retained safety snapshots, newest first")
                        .arg(Arg::new("username").help("Only show snapshots of this client")),
                )
                .subcommand(
                    Command::new("prune")
                        .about("Delete old safety snapshots of a client")
                        .arg(username_arg())
                        .arg(
                            Arg::new("keep")
                                .short('k')
                                .long("keep")
                                .default_value("3")
                                .help("Number of newest snapshots to keep"),
                        ),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("botfleet.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
