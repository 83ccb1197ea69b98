//! `lnprobe probe`: probe for a route to a destination.

use clap::{Args, ValueEnum};
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

use lnprobe_core::{ChannelId, Ignore, Millitokens, ProbeState, PublicKey};
use lnprobe_probe::{subscribe_to_probe_for_route, ProbeEvent, ProbeRequest};

use crate::config::LnprobeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Destination node public key (hex).
    pub destination: String,

    /// Amount in tokens.
    #[arg(short, long, conflicts_with = "mtokens")]
    pub tokens: Option<u64>,

    /// Amount in millitokens.
    #[arg(long)]
    pub mtokens: Option<String>,

    /// Maximum routing fee in millitokens.
    #[arg(long)]
    pub max_fee_mtokens: Option<String>,

    /// Never route through this node (repeatable).
    #[arg(long = "ignore-node")]
    pub ignore_nodes: Vec<String>,

    /// Never use this channel, as `<block>x<tx>x<output>` or a number (repeatable).
    #[arg(long = "ignore-channel")]
    pub ignore_channels: Vec<String>,

    /// Final hop CLTV delta.
    #[arg(long)]
    pub cltv_delta: Option<u16>,

    /// Maximum CLTV timeout height.
    #[arg(long)]
    pub max_timeout_height: Option<u32>,

    /// Last node before the destination.
    #[arg(long)]
    pub incoming_peer: Option<String>,

    /// First channel out of the local node.
    #[arg(long)]
    pub outgoing_channel: Option<String>,

    /// Override the session timeout.
    #[arg(long)]
    pub probe_timeout_ms: Option<u64>,

    /// Override the per-attempt timeout.
    #[arg(long)]
    pub path_timeout_ms: Option<u64>,

    /// Override the attempt limit.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// End quietly instead of reporting an error event.
    #[arg(long)]
    pub suppress_errors: bool,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl ProbeArgs {
    fn to_request(&self) -> anyhow::Result<ProbeRequest> {
        let mut builder = ProbeRequest::builder()
            .destination(self.destination.parse::<PublicKey>()?)
            .suppress_errors(self.suppress_errors);

        if let Some(tokens) = self.tokens {
            builder = builder.tokens(tokens);
        }
        if let Some(mtokens) = &self.mtokens {
            builder = builder.mtokens(mtokens.parse::<Millitokens>()?);
        }
        if let Some(max_fee) = &self.max_fee_mtokens {
            builder = builder.max_fee_mtokens(max_fee.parse::<Millitokens>()?);
        }
        for node in &self.ignore_nodes {
            builder = builder.ignore(Ignore::Node {
                public_key: node.parse()?,
            });
        }
        for channel in &self.ignore_channels {
            builder = builder.ignore(Ignore::Channel {
                channel: channel.parse()?,
            });
        }
        if let Some(cltv_delta) = self.cltv_delta {
            builder = builder.cltv_delta(cltv_delta);
        }
        if let Some(height) = self.max_timeout_height {
            builder = builder.max_timeout_height(height);
        }
        if let Some(peer) = &self.incoming_peer {
            builder = builder.incoming_peer(peer.parse()?);
        }
        if let Some(channel) = &self.outgoing_channel {
            builder = builder.outgoing_channel(channel.parse::<ChannelId>()?);
        }
        if let Some(ms) = self.probe_timeout_ms {
            builder = builder.probe_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.path_timeout_ms {
            builder = builder.path_timeout(Duration::from_millis(ms));
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }

        Ok(builder.build()?)
    }
}

pub async fn run(config: &LnprobeConfig, args: &ProbeArgs) -> anyhow::Result<()> {
    let request = args.to_request()?.with_defaults(&config.probe);
    let client = super::connect(&config.node)?;
    let mut subscription = subscribe_to_probe_for_route(client, request)?;
    tracing::info!(session_id = %subscription.id(), "probe subscribed");

    let mut outcome = None;
    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else { break };
                if let ProbeEvent::End { state, .. } = &event {
                    outcome = Some(*state);
                }
                print_event(&event, args.output)?;
            }
            _ = tokio::signal::ctrl_c() => {
                subscription.unsubscribe();
                outcome = Some(ProbeState::Cancelled);
                break;
            }
        }
    }

    match outcome {
        Some(ProbeState::Succeeded) => Ok(()),
        Some(state) => anyhow::bail!("probe ended {state}"),
        None => anyhow::bail!("probe ended without a result"),
    }
}

fn print_event(event: &ProbeEvent, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&event_json(event))?),
        OutputFormat::Text => println!("{}", event_text(event)),
    }
    Ok(())
}

fn event_json(event: &ProbeEvent) -> serde_json::Value {
    match event {
        ProbeEvent::Probing { route } => json!({ "event": event.name(), "route": route }),
        ProbeEvent::RoutingFailure(failure) => json!({ "event": event.name(), "failure": failure }),
        ProbeEvent::ProbeSuccess { route } => json!({ "event": event.name(), "route": route }),
        ProbeEvent::Error(e) => json!({
            "event": event.name(),
            "code": e.code(),
            "label": e.label(),
            "message": e.to_string(),
        }),
        ProbeEvent::End { state, attempts } => {
            json!({ "event": event.name(), "state": state, "attempts": attempts })
        }
    }
}

fn event_text(event: &ProbeEvent) -> String {
    match event {
        ProbeEvent::Probing { route } => format!(
            "probing  {} hops, {} mtokens, fee {} mtokens",
            route.hop_count(),
            route.mtokens,
            route.fee_mtokens
        ),
        ProbeEvent::RoutingFailure(failure) => {
            let channel = failure
                .channel
                .map(|channel| channel.to_string())
                .unwrap_or_else(|| "?".into());
            format!("failure  hop {} on {channel}: {}", failure.index, failure.reason)
        }
        ProbeEvent::ProbeSuccess { route } => format!(
            "success  {} hops, fee {} mtokens (safe fee {} tokens), timeout {}",
            route.hop_count(),
            route.fee_mtokens,
            route.safe_fee(),
            route.timeout
        ),
        ProbeEvent::Error(e) => format!("error    [{}] {}: {e}", e.code(), e.label()),
        ProbeEvent::End { state, attempts } => format!("end      {state} after {attempts} attempts"),
    }
}
