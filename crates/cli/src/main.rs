// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fleetctl - operator CLI for the fleet control plane (§6.3).

mod color;
mod commands;
mod config;
mod daemon_process;
mod exit_error;
mod output;
mod poll;
mod resolve;
mod rpc_client;
mod table;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::agent::{self, AgentArgs};
use config::CliConfig;
use output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "fleetctl",
    version,
    about = "Control a fleet of agents through the master registry"
)]
struct Cli {
    /// Master registry address, or a name already in the local cache.
    #[arg(long, global = true)]
    master: Option<String>,

    /// Bypass the master and resolve agent names from the local cache only.
    #[arg(long, global = true)]
    local: bool,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Agent management
    Agent(AgentArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<exit_error::ExitError>().map_or(1, |c| c.code);
        eprintln!("Error: {}", format_error(&e));
        std::process::exit(code);
    }
}

/// Format an anyhow error, deduplicating a redundant source chain.
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();
    let chain_redundant = err.chain().skip(1).all(|cause| top.contains(&cause.to_string()));
    if chain_redundant {
        return top;
    }
    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load().context("loading fleetctl configuration")?;
    let master = cli.master.unwrap_or(config.master_address);

    match cli.command {
        Commands::Agent(args) => agent::run(args, &master, cli.local, cli.output).await,
    }
}
