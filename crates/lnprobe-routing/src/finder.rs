use std::cmp::Reverse;
use std::sync::Arc;

use lnprobe_core::{Capability, LightningRpc, PublicKey, Route, RouteQuery};

use crate::error::RoutingError;
use crate::ignore::IgnoreSet;

/// Asks the node for candidate routes to a destination.
///
/// The node already excludes everything in the ignore snapshot it is sent;
/// the finder re-checks each candidate against the [`IgnoreSet`] and the fee
/// ceiling so that a node which ignores a constraint cannot make a session
/// retry an edge that already failed.
pub struct RouteFinder<R: ?Sized> {
    rpc: Arc<R>,
}

impl<R: ?Sized> Clone for RouteFinder<R> {
    fn clone(&self) -> Self {
        Self {
            rpc: Arc::clone(&self.rpc),
        }
    }
}

impl<R: LightningRpc + ?Sized> RouteFinder<R> {
    pub fn new(rpc: Arc<R>) -> Self {
        Self { rpc }
    }

    /// Find candidate routes for `template` while avoiding `ignore`.
    ///
    /// `source` is the key of the node the routes start from. The template's
    /// own `ignore` list is replaced with a snapshot of `ignore`. Returns an
    /// empty list when no route exists under the current constraints.
    /// Candidates are ordered by confidence, highest first; routes without a
    /// confidence sort last and ties keep the node's order.
    pub async fn find_routes(
        &self,
        source: &PublicKey,
        template: &RouteQuery,
        ignore: &IgnoreSet,
    ) -> Result<Vec<Route>, RoutingError> {
        if template.mtokens.is_zero() {
            return Err(RoutingError::ZeroAmount);
        }
        if !self.rpc.supports(Capability::QueryRoutes) {
            return Err(RoutingError::Unsupported);
        }

        let query = RouteQuery {
            ignore: ignore.to_vec(),
            ..template.clone()
        };

        let returned = self.rpc.query_routes(&query).await?;
        let total = returned.len();

        let mut candidates: Vec<Route> = returned
            .into_iter()
            .filter(|route| ignore.allows(source, route))
            .filter(|route| match template.max_fee_mtokens {
                Some(max_fee) => route.fee_mtokens <= max_fee,
                None => true,
            })
            .filter(|route| !route.hops.is_empty())
            .collect();

        candidates.sort_by_key(|route| Reverse(route.confidence));

        tracing::debug!(
            destination = %template.destination,
            mtokens = %template.mtokens,
            ignored = ignore.len(),
            returned = total,
            candidates = candidates.len(),
            "route query complete"
        );

        Ok(candidates)
    }
}
