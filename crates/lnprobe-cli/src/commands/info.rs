//! `lnprobe info`: show the node's identity and features.

use clap::Args;
use lnprobe_core::LightningRpc;

use crate::config::LnprobeConfig;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

pub async fn run(config: &LnprobeConfig, args: &InfoArgs) -> anyhow::Result<()> {
    let client = super::connect(&config.node)?;
    let info = client.get_info().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Node:");
    println!("  Public key:   {}", info.public_key);
    println!("  Alias:        {}", info.alias);
    println!("  Block height: {}", info.block_height);
    println!("  Synced:       {}", info.is_synced_to_chain);
    println!("  Features:");
    for feature in &info.features {
        let kind = if feature.is_required { "required" } else { "optional" };
        println!("    {:>4}  {} ({kind})", feature.bit, feature.name);
    }

    Ok(())
}
