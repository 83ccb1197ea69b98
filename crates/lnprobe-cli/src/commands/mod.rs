pub mod info;
pub mod init;
pub mod probe;

use anyhow::Context;
use lnprobe_probe::LndRestClient;
use std::sync::Arc;

use crate::config::NodeConfig;

/// Build the node client from the `[node]` section.
pub fn connect(node: &NodeConfig) -> anyhow::Result<Arc<LndRestClient>> {
    let macaroon = node
        .macaroon_path
        .as_ref()
        .map(|path| {
            std::fs::read(path).with_context(|| format!("reading macaroon {}", path.display()))
        })
        .transpose()?;
    let tls_cert = node
        .tls_cert_path
        .as_ref()
        .map(|path| {
            std::fs::read(path).with_context(|| format!("reading TLS certificate {}", path.display()))
        })
        .transpose()?;

    let client = LndRestClient::new(node.rest_url.clone(), macaroon.as_deref(), tls_cert.as_deref())?;
    Ok(Arc::new(client))
}
