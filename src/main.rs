//! wayctl - control the Wayfire compositor from the command line
//!
//! Talks to Wayfire over its IPC socket to:
//! - Print views and outputs
//! - Move views between workspaces
//! - Save the open applications and restore them later
//! - Take screenshots and pick colors
//!
//! # Examples
//!
//! ```bash
//! # Print the focused view
//! wayctl --view focused
//!
//! # Save the running applications and their workspaces
//! wayctl --session save
//!
//! # Relaunch them after a restart
//! wayctl --session start
//!
//! # Select a region and open a screenshot of it
//! wayctl --screenshot slurp
//! ```

mod actions;
mod cli;
mod config;
mod dropdown;
mod error;
mod ipc;
mod process;
mod replay;
mod screenshot;
mod session;
mod types;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use actions::Ctl;
use cli::Cli;
use config::Config;
use ipc::WayfireSocket;

fn run(cli: Cli) -> Result<()> {
    let actions = cli.actions().map_err(|e| anyhow!(e))?;

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone()),
        None => Config::load(),
    };

    let sock = match &cli.socket {
        Some(path) => WayfireSocket::connect_to(path),
        None => WayfireSocket::connect(),
    }
    .context("Cannot reach the compositor")?;

    let mut ctl = Ctl::new(sock, config, cli.raw);
    for action in actions {
        ctl.handle(action)?;
    }
    Ok(())
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn")
    ).init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
