use std::time::Duration;

use lnprobe_core::{
    ChannelId, CoreError, Ignore, Millitokens, ProbeConfig, PublicKey, RouteHint, RouteQuery,
};

/// What to probe and under which constraints.
///
/// Build one with [`ProbeRequest::builder`]. A session takes its own copy, so
/// changing a request after subscribing has no effect on that session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub destination: PublicKey,
    pub mtokens: Millitokens,
    /// Excluded from every route search of the session.
    pub ignore: Vec<Ignore>,
    /// Private routing hints toward the destination.
    pub routes: Vec<RouteHint>,
    pub max_fee_mtokens: Option<Millitokens>,
    /// Final hop CLTV delta.
    pub cltv_delta: Option<u16>,
    pub max_timeout_height: Option<u32>,
    /// Last node before the destination.
    pub incoming_peer: Option<PublicKey>,
    /// First channel out of the local node.
    pub outgoing_channel: Option<ChannelId>,
    /// Whole-session deadline.
    pub probe_timeout: Option<Duration>,
    /// Per-attempt deadline.
    pub path_timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    /// End silently instead of emitting `error` events.
    pub suppress_errors: bool,
}

impl ProbeRequest {
    /// Create a new [`ProbeRequestBuilder`].
    pub fn builder() -> ProbeRequestBuilder {
        ProbeRequestBuilder::default()
    }

    /// Check the fields a session cannot start without.
    pub fn validate(&self) -> Result<(), CoreError> {
        for entry in &self.ignore {
            if let Ignore::Edge {
                from_public_key,
                to_public_key,
                ..
            } = entry
            {
                if from_public_key == to_public_key {
                    return Err(CoreError::ValidationError(format!(
                        "ignored edge from {from_public_key} loops back to itself"
                    )));
                }
            }
        }

        if self.mtokens.is_zero() {
            return Err(CoreError::InvalidAmount(
                "probe amount must be greater than zero".into(),
            ));
        }

        if self.probe_timeout == Some(Duration::ZERO) {
            return Err(CoreError::ValidationError(
                "probe timeout must be greater than zero".into(),
            ));
        }

        if self.max_attempts == Some(0) {
            return Err(CoreError::ValidationError(
                "max attempts must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Fill unset timeouts and attempt limits from `config`.
    pub fn with_defaults(mut self, config: &ProbeConfig) -> Self {
        self.probe_timeout = self.probe_timeout.or(Some(config.probe_timeout()));
        self.path_timeout = self.path_timeout.or(config.path_timeout());
        self.max_attempts = self.max_attempts.or(config.max_attempts);
        self
    }

    /// Route search template; the session swaps in its own ignore list on
    /// every query.
    pub fn route_query(&self) -> RouteQuery {
        RouteQuery {
            destination: self.destination,
            mtokens: self.mtokens,
            cltv_delta: self.cltv_delta,
            ignore: self.ignore.clone(),
            incoming_peer: self.incoming_peer,
            max_fee_mtokens: self.max_fee_mtokens,
            max_timeout_height: self.max_timeout_height,
            outgoing_channel: self.outgoing_channel,
            routes: self.routes.clone(),
        }
    }
}

/// Builder for constructing [`ProbeRequest`] instances.
#[derive(Debug, Default)]
pub struct ProbeRequestBuilder {
    destination: Option<PublicKey>,
    mtokens: Option<Millitokens>,
    ignore: Vec<Ignore>,
    routes: Vec<RouteHint>,
    max_fee_mtokens: Option<Millitokens>,
    cltv_delta: Option<u16>,
    max_timeout_height: Option<u32>,
    incoming_peer: Option<PublicKey>,
    outgoing_channel: Option<ChannelId>,
    probe_timeout: Option<Duration>,
    path_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    suppress_errors: bool,
}

impl ProbeRequestBuilder {
    /// Set the node to probe.
    pub fn destination(mut self, destination: PublicKey) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Set the amount in millitokens.
    pub fn mtokens(mut self, mtokens: Millitokens) -> Self {
        self.mtokens = Some(mtokens);
        self
    }

    /// Set the amount in whole tokens.
    pub fn tokens(mut self, tokens: u64) -> Self {
        self.mtokens = Some(Millitokens::from_tokens(tokens));
        self
    }

    /// Exclude a node, edge or channel for the whole session.
    pub fn ignore(mut self, entry: Ignore) -> Self {
        self.ignore.push(entry);
        self
    }

    /// Add a private routing hint.
    pub fn route_hint(mut self, hint: RouteHint) -> Self {
        self.routes.push(hint);
        self
    }

    pub fn max_fee_mtokens(mut self, max_fee: Millitokens) -> Self {
        self.max_fee_mtokens = Some(max_fee);
        self
    }

    pub fn cltv_delta(mut self, cltv_delta: u16) -> Self {
        self.cltv_delta = Some(cltv_delta);
        self
    }

    pub fn max_timeout_height(mut self, height: u32) -> Self {
        self.max_timeout_height = Some(height);
        self
    }

    pub fn incoming_peer(mut self, peer: PublicKey) -> Self {
        self.incoming_peer = Some(peer);
        self
    }

    pub fn outgoing_channel(mut self, channel: ChannelId) -> Self {
        self.outgoing_channel = Some(channel);
        self
    }

    /// Set the whole-session deadline.
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Set the per-attempt deadline.
    pub fn path_timeout(mut self, timeout: Duration) -> Self {
        self.path_timeout = Some(timeout);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn suppress_errors(mut self, suppress: bool) -> Self {
        self.suppress_errors = suppress;
        self
    }

    /// Build the ProbeRequest.
    pub fn build(self) -> Result<ProbeRequest, CoreError> {
        let destination = self
            .destination
            .ok_or_else(|| CoreError::MissingField("destination".into()))?;
        let mtokens = self
            .mtokens
            .ok_or_else(|| CoreError::MissingField("mtokens".into()))?;

        let request = ProbeRequest {
            destination,
            mtokens,
            ignore: self.ignore,
            routes: self.routes,
            max_fee_mtokens: self.max_fee_mtokens,
            cltv_delta: self.cltv_delta,
            max_timeout_height: self.max_timeout_height,
            incoming_peer: self.incoming_peer,
            outgoing_channel: self.outgoing_channel,
            probe_timeout: self.probe_timeout,
            path_timeout: self.path_timeout,
            max_attempts: self.max_attempts,
            suppress_errors: self.suppress_errors,
        };

        request.validate()?;
        Ok(request)
    }
}
