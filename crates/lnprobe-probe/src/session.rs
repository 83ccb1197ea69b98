//! The probe-for-route session controller.
//!
//! Every session runs on its own tokio task that owns all session state. The
//! route-find/attempt loop races the session deadline and the unsubscribe
//! signal inside one `select!`; the deadline is polled first, and whichever
//! branch completes first decides the terminal state. The loop yields to the
//! scheduler on every cycle so that a node client answering without ever
//! suspending cannot starve the timer.

use std::sync::Arc;
use std::time::Duration;

use lnprobe_core::{
    Capability, LightningRpc, ProbeConfig, ProbeInput, ProbeState, ProbeStateMachine, PublicKey,
    Route, RouteQuery,
};
use lnprobe_routing::{IgnoreSet, RouteFinder};
use tokio::sync::Notify;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::ProbeError;
use crate::events::{EventSink, ProbeEvent, ProbeSubscription};
use crate::prober::{AttemptOutcome, RouteProber};
use crate::request::ProbeRequest;
use crate::timeouts::ProbeTimers;

/// Start probing for a route to `request.destination`.
///
/// The request is validated and the client's capabilities are checked before
/// anything runs; those errors are returned here and no event is emitted.
/// Everything that goes wrong later arrives on the subscription as an
/// `Error` event followed by `End`. Unset timeouts take the
/// [`ProbeConfig`] defaults.
///
/// Must be called from within a tokio runtime.
pub fn subscribe_to_probe_for_route<R>(
    rpc: Arc<R>,
    request: ProbeRequest,
) -> Result<ProbeSubscription, ProbeError>
where
    R: LightningRpc + ?Sized + 'static,
{
    request.validate()?;
    if let Some(missing) = Capability::PROBING
        .into_iter()
        .find(|capability| !rpc.supports(*capability))
    {
        return Err(ProbeError::MissingCapability(missing));
    }

    let defaults = ProbeConfig::default();
    let request = request.with_defaults(&defaults);
    let probe_timeout = request.probe_timeout.unwrap_or(defaults.probe_timeout());
    let id = Uuid::now_v7();
    let (sink, receiver) = EventSink::channel(request.suppress_errors);
    let cancel = Arc::new(Notify::new());

    let span = tracing::info_span!(
        "probe",
        session_id = %id,
        destination = %request.destination,
        mtokens = %request.mtokens,
    );

    let session = ProbeSession::new(rpc, request, probe_timeout, sink.clone(), Arc::clone(&cancel));
    let task = tokio::spawn(session.run().instrument(span));

    Ok(ProbeSubscription::new(id, receiver, sink, cancel, task))
}

/// Why the session stopped.
#[derive(Debug)]
enum Halt {
    Reached(Route),
    Exhausted,
    TimedOut,
    Failed(ProbeError),
    Cancelled,
}

struct ProbeSession<R: ?Sized> {
    rpc: Arc<R>,
    finder: RouteFinder<R>,
    prober: RouteProber<R>,
    template: RouteQuery,
    ignore: IgnoreSet,
    max_attempts: Option<u32>,
    attempts: u32,
    state: ProbeState,
    timers: ProbeTimers,
    sink: EventSink,
    cancel: Arc<Notify>,
}

impl<R: LightningRpc + ?Sized> ProbeSession<R> {
    fn new(
        rpc: Arc<R>,
        request: ProbeRequest,
        probe_timeout: Duration,
        sink: EventSink,
        cancel: Arc<Notify>,
    ) -> Self {
        Self {
            finder: RouteFinder::new(Arc::clone(&rpc)),
            prober: RouteProber::new(Arc::clone(&rpc)),
            rpc,
            template: request.route_query(),
            ignore: IgnoreSet::seeded(request.ignore),
            max_attempts: request.max_attempts,
            attempts: 0,
            state: ProbeState::Idle,
            timers: ProbeTimers::start(probe_timeout, request.path_timeout),
            sink,
            cancel,
        }
    }

    async fn run(mut self) {
        tracing::info!(timeout_ms = self.timers.remaining().as_millis() as u64, "probe started");

        let timers = self.timers;
        let cancel = Arc::clone(&self.cancel);
        let halt = tokio::select! {
            biased;
            _ = timers.session_elapsed() => Halt::TimedOut,
            _ = cancel.notified() => Halt::Cancelled,
            halt = self.drive() => halt,
        };

        self.finish(halt);
    }

    async fn drive(&mut self) -> Halt {
        if let Err(e) = self.advance(ProbeInput::Start) {
            return Halt::Failed(e);
        }

        let info = match self.rpc.get_info().await {
            Ok(info) => info,
            Err(e) => return Halt::Failed(ProbeError::GetInfo(e)),
        };
        if info.features.is_empty() {
            return Halt::Failed(ProbeError::MissingNodeFeatures);
        }
        let source = info.public_key;

        loop {
            tokio::task::yield_now().await;
            if self.timers.session_expired() {
                return Halt::TimedOut;
            }

            if self.max_attempts.is_some_and(|max| self.attempts >= max) {
                tracing::info!(attempts = self.attempts, "attempt limit reached");
                return Halt::Exhausted;
            }

            match self.probe_next_route(&source).await {
                Ok(Some(halt)) => return halt,
                Ok(None) => continue,
                Err(e) => return Halt::Failed(e),
            }
        }
    }

    /// One find-and-attempt cycle. `Ok(None)` means try again.
    async fn probe_next_route(&mut self, source: &PublicKey) -> Result<Option<Halt>, ProbeError> {
        let routes = self
            .finder
            .find_routes(source, &self.template, &self.ignore)
            .await?;
        let Some(route) = routes.first().cloned() else {
            tracing::info!(attempts = self.attempts, "no more routes");
            return Ok(Some(Halt::Exhausted));
        };

        // Every candidate is announced in ranked order; only the top one is tried.
        for candidate in routes {
            self.sink.emit(ProbeEvent::Probing { route: candidate });
        }
        self.advance(ProbeInput::RoutesFound)?;

        self.attempts += 1;
        tracing::debug!(
            attempt = self.attempts,
            hops = route.hop_count(),
            fee_mtokens = %route.fee_mtokens,
            "probing route"
        );

        let outcome = match self.timers.within_path(self.prober.attempt(source, &route)).await {
            Some(outcome) => outcome?,
            None => {
                tracing::debug!(attempt = self.attempts, "path timed out");
                self.advance(ProbeInput::PathTimedOut)?;
                return Ok(None);
            }
        };

        match outcome {
            AttemptOutcome::Reached => Ok(Some(Halt::Reached(route))),
            AttemptOutcome::Failed(failure) => {
                self.ignore.exclude_failure(source, &failure);
                self.sink.emit(ProbeEvent::RoutingFailure(failure));
                self.advance(ProbeInput::RoutingFailed)?;
                Ok(None)
            }
            AttemptOutcome::Inconclusive => {
                tracing::debug!(attempt = self.attempts, "attempt inconclusive");
                self.advance(ProbeInput::AttemptInconclusive)?;
                Ok(None)
            }
        }
    }

    fn advance(&mut self, input: ProbeInput) -> Result<(), ProbeError> {
        self.state = ProbeStateMachine::transition(self.state, input)?;
        Ok(())
    }

    fn finish(&mut self, halt: Halt) {
        let (input, payload) = match halt {
            Halt::Reached(route) => (
                ProbeInput::ReachedDestination,
                Some(ProbeEvent::ProbeSuccess { route }),
            ),
            Halt::Exhausted => (ProbeInput::NoRoutes, None),
            Halt::TimedOut => (
                ProbeInput::SessionTimedOut,
                Some(ProbeEvent::Error(ProbeError::ProbeTimeout)),
            ),
            Halt::Failed(e) => (ProbeInput::FatalError, Some(ProbeEvent::Error(e))),
            Halt::Cancelled => (ProbeInput::Unsubscribed, None),
        };

        self.state = match ProbeStateMachine::transition(self.state, input) {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "unexpected terminal transition");
                ProbeState::Failed
            }
        };

        if let Some(ProbeEvent::Error(e)) = &payload {
            tracing::warn!(code = e.code(), error = %e, "probe failed");
        }

        if self.state == ProbeState::Cancelled {
            self.sink.close();
        } else {
            self.sink.finish(payload, self.state, self.attempts);
        }

        tracing::info!(
            state = %self.state,
            attempts = self.attempts,
            ignored = self.ignore.len(),
            "probe finished"
        );
    }
}
