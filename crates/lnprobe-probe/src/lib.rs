//! lnprobe probe engine
//!
//! Probes whether a destination is reachable for an amount without moving
//! funds. A session repeatedly asks the node for a route, sends an HTLC along
//! it locked to a payment hash nobody can settle, learns from the failures
//! and streams progress to the caller until the destination answers, routes
//! run out, or the session deadline passes.
//!
//! Node access goes through [`lnprobe_core::LightningRpc`]; [`adapters`]
//! holds a scripted in-memory node and an LND REST client.

pub mod adapters;
pub mod error;
pub mod events;
pub mod prober;
pub mod request;
pub mod session;
pub mod timeouts;

pub use adapters::lnd_rest::LndRestClient;
pub use adapters::scripted::{ScriptedAttempt, ScriptedNode};
pub use error::ProbeError;
pub use events::{ProbeEvent, ProbeSubscription};
pub use prober::{AttemptOutcome, RouteProber};
pub use request::{ProbeRequest, ProbeRequestBuilder};
pub use session::subscribe_to_probe_for_route;
pub use timeouts::ProbeTimers;
