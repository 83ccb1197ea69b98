use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lnprobe_core::{
    AttemptResult, Capability, LightningRpc, NodeFeature, NodeInfo, PaymentHash, PublicKey, Route,
    RouteQuery, RpcError,
};

/// One scripted answer to `send_to_route`.
#[derive(Debug, Clone)]
pub struct ScriptedAttempt {
    /// Time to wait before answering.
    pub delay: Option<Duration>,
    pub answer: Result<AttemptResult, RpcError>,
}

/// In-memory Lightning node that answers from scripted queues.
///
/// Route queries pop the next queued answer; once the queue is empty they
/// return the `always_routes` answer, or no routes. Attempts work the same
/// way and default to an inconclusive result. Every query and attempt is
/// recorded for inspection.
pub struct ScriptedNode {
    info: Mutex<Result<NodeInfo, RpcError>>,
    disabled: Mutex<HashSet<Capability>>,
    routes: Mutex<VecDeque<Result<Vec<Route>, RpcError>>>,
    fallback_routes: Mutex<Vec<Route>>,
    attempts: Mutex<VecDeque<ScriptedAttempt>>,
    queries: Mutex<Vec<RouteQuery>>,
    sent: Mutex<Vec<(Route, PaymentHash)>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedNode {
    /// A synced node with identity `public_key` advertising a basic feature
    /// set.
    pub fn new(public_key: PublicKey) -> Self {
        let info = NodeInfo {
            public_key,
            alias: "scripted".into(),
            block_height: 800_000,
            features: vec![
                NodeFeature {
                    bit: 9,
                    name: "tlv-onion".into(),
                    is_known: true,
                    is_required: false,
                },
                NodeFeature {
                    bit: 15,
                    name: "payment-addr".into(),
                    is_known: true,
                    is_required: false,
                },
            ],
            is_synced_to_chain: true,
        };
        Self {
            info: Mutex::new(Ok(info)),
            disabled: Mutex::new(HashSet::new()),
            routes: Mutex::new(VecDeque::new()),
            fallback_routes: Mutex::new(Vec::new()),
            attempts: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Make `get_info` fail with `error`.
    pub fn fail_get_info(&self, error: RpcError) {
        *lock(&self.info) = Err(error);
    }

    /// Replace the advertised features.
    pub fn set_features(&self, features: Vec<NodeFeature>) {
        if let Ok(info) = lock(&self.info).as_mut() {
            info.features = features;
        }
    }

    /// Report `capability` as unsupported.
    pub fn disable(&self, capability: Capability) {
        lock(&self.disabled).insert(capability);
    }

    /// Queue an answer for the next route query.
    pub fn push_routes(&self, routes: Vec<Route>) {
        lock(&self.routes).push_back(Ok(routes));
    }

    /// Queue a failure for the next route query.
    pub fn push_route_error(&self, error: RpcError) {
        lock(&self.routes).push_back(Err(error));
    }

    /// Answer every route query with `routes` once the queue is empty.
    pub fn always_routes(&self, routes: Vec<Route>) {
        *lock(&self.fallback_routes) = routes;
    }

    /// Queue an immediate answer for the next attempt.
    pub fn push_attempt(&self, answer: AttemptResult) {
        self.push_scripted_attempt(ScriptedAttempt {
            delay: None,
            answer: Ok(answer),
        });
    }

    /// Queue an answer for the next attempt, delivered after `delay`.
    pub fn push_attempt_after(&self, delay: Duration, answer: AttemptResult) {
        self.push_scripted_attempt(ScriptedAttempt {
            delay: Some(delay),
            answer: Ok(answer),
        });
    }

    /// Queue a transport failure for the next attempt.
    pub fn push_attempt_error(&self, error: RpcError) {
        self.push_scripted_attempt(ScriptedAttempt {
            delay: None,
            answer: Err(error),
        });
    }

    pub fn push_scripted_attempt(&self, attempt: ScriptedAttempt) {
        lock(&self.attempts).push_back(attempt);
    }

    /// Route queries received so far.
    pub fn queries(&self) -> Vec<RouteQuery> {
        lock(&self.queries).clone()
    }

    /// Routes attempted so far, with the payment hash of each attempt.
    pub fn sent(&self) -> Vec<(Route, PaymentHash)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl LightningRpc for ScriptedNode {
    fn supports(&self, capability: Capability) -> bool {
        !lock(&self.disabled).contains(&capability)
    }

    async fn get_info(&self) -> Result<NodeInfo, RpcError> {
        lock(&self.info).clone()
    }

    async fn query_routes(&self, query: &RouteQuery) -> Result<Vec<Route>, RpcError> {
        lock(&self.queries).push(query.clone());
        let queued = lock(&self.routes).pop_front();
        match queued {
            Some(answer) => answer,
            None => Ok(lock(&self.fallback_routes).clone()),
        }
    }

    async fn send_to_route(
        &self,
        route: &Route,
        payment_hash: &PaymentHash,
    ) -> Result<AttemptResult, RpcError> {
        lock(&self.sent).push((route.clone(), *payment_hash));
        let scripted = lock(&self.attempts).pop_front();
        let Some(scripted) = scripted else {
            return Ok(AttemptResult::default());
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.answer
    }
}
