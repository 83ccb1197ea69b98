//! `lnprobe init`: write a default configuration file.

use clap::Args;
use std::path::Path;

use crate::config::LnprobeConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(config_path: &Path, args: &InitArgs) -> anyhow::Result<()> {
    if config_path.exists() && !args.force {
        anyhow::bail!("configuration file already exists at {}", config_path.display());
    }

    LnprobeConfig::default().save(config_path)?;
    println!("Wrote default configuration to {}", config_path.display());
    println!("Set [node] rest_url, macaroon_path and tls_cert_path for your LND node.");
    println!("Run 'lnprobe info' to check the connection.");

    Ok(())
}
