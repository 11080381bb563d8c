//! Otter command-line interface
//!
//! One binary for both roles: `daemon` runs a member, every other command
//! acts as the controller against the coordination store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::run::RunArgs;
use otter_core::config::DEFAULT_CONFIG_PATH;
use otter_protocol::Verb;

#[derive(Parser)]
#[command(name = "otter")]
#[command(about = "Otter - declarative host state over a coordination store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Coordination store endpoints, comma separated
    #[arg(short, long = "etcd", global = true)]
    etcd: Option<String>,

    /// Declarative state file
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// Host identity override
    #[arg(long, global = true)]
    host: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the state file and hand it to every live host
    Load,

    /// List live hosts
    Ls,

    /// Check every host against its state
    State(RunArgs),

    /// Reconcile every host to its state
    Apply(RunArgs),

    /// Run the member role until interrupted
    Daemon,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let overrides = config::Overrides {
        endpoints: cli.etcd,
        state: cli.state,
        hostname: cli.host,
    };
    let config = config::load(&cli.config, &overrides)?;
    let context = commands::Context::new(config, cli.json)?;

    let consistent = match cli.command {
        Commands::Load => commands::load::run(&context).await?,
        Commands::Ls => commands::ls::run(&context).await?,
        Commands::State(args) => commands::run::run(&context, &args, Verb::State).await?,
        Commands::Apply(args) => commands::run::run(&context, &args, Verb::Apply).await?,
        Commands::Daemon => commands::daemon::run(&context).await?,
    };

    Ok(if consistent {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
