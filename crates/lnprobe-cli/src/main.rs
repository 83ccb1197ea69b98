//! lnprobe CLI: probe Lightning routes through an LND node.
//!
//! Subcommands: init, info, probe.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{LnprobeConfig, LoggingConfig};

/// Probe whether a Lightning destination is reachable without paying it.
#[derive(Parser, Debug)]
#[command(name = "lnprobe", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, global = true, default_value = "lnprobe.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file.
    Init(commands::init::InitArgs),
    /// Show the node's identity and features.
    Info(commands::info::InfoArgs),
    /// Probe for a route to a destination.
    Probe(commands::probe::ProbeArgs),
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) {
    let level = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Events go to stdout; logs stay on stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Init(args) = &cli.command {
        return commands::init::run(&cli.config, args);
    }

    let config = LnprobeConfig::load(&cli.config)?;
    init_tracing(&config.logging, cli.log_level.as_deref());
    tracing::debug!(path = %cli.config.display(), rest_url = %config.node.rest_url, "loaded config");

    match &cli.command {
        Commands::Init(_) => Ok(()),
        Commands::Info(args) => commands::info::run(&config, args).await,
        Commands::Probe(args) => commands::probe::run(&config, args).await,
    }
}
