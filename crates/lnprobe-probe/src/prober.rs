use std::sync::Arc;

use lnprobe_core::{LightningRpc, PaymentHash, PublicKey, Route, RoutingFailure};

use crate::error::ProbeError;

/// How a single probe attempt resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The destination itself refused the HTLC: the route works.
    Reached,
    /// A hop before the destination refused to forward.
    Failed(RoutingFailure),
    /// The node reported neither a failure nor a preimage.
    Inconclusive,
}

/// Sends probe HTLCs and classifies the node's answer.
pub struct RouteProber<R: ?Sized> {
    rpc: Arc<R>,
}

impl<R: LightningRpc + ?Sized> RouteProber<R> {
    pub fn new(rpc: Arc<R>) -> Self {
        Self { rpc }
    }

    /// Send one HTLC along `route`, which starts at `source`.
    ///
    /// Each attempt uses a fresh random payment hash, so the destination
    /// cannot know the preimage and nothing can settle.
    pub async fn attempt(
        &self,
        source: &PublicKey,
        route: &Route,
    ) -> Result<AttemptOutcome, ProbeError> {
        let payment_hash = PaymentHash::random();
        tracing::debug!(
            payment_hash = %payment_hash,
            hops = route.hop_count(),
            mtokens = %route.mtokens,
            "sending probe"
        );

        let result = self
            .rpc
            .send_to_route(route, &payment_hash)
            .await
            .map_err(ProbeError::SendToRoute)?;

        if !result.preimage.is_empty() {
            tracing::error!(payment_hash = %payment_hash, "probe settled");
            return Err(ProbeError::ProbeSettled);
        }

        let Some(failure) = result.failure else {
            return Ok(AttemptOutcome::Inconclusive);
        };

        let hops = route.hop_count();
        let index = failure.failure_source_index;
        if index == hops {
            tracing::debug!(code = %failure.code, "destination answered probe");
            return Ok(AttemptOutcome::Reached);
        }
        if index > hops {
            return Err(ProbeError::MalformedFailure { index, hops });
        }

        let failure = RoutingFailure::from_hop_failure(source, route, &failure);
        tracing::debug!(
            index,
            reason = %failure.reason,
            channel = ?failure.channel,
            "probe refused"
        );
        Ok(AttemptOutcome::Failed(failure))
    }
}
