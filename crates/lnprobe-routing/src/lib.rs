//! lnprobe routing: candidate route discovery for probe sessions.
//!
//! This crate provides:
//! - [`IgnoreSet`]: the session-scoped, grow-only set of excluded nodes and edges.
//! - [`RouteFinder`]: asks the node for candidate routes under the current
//!   constraints, drops any that cross an ignored edge or exceed the fee
//!   ceiling, and ranks the rest by confidence.

pub mod error;
pub mod finder;
pub mod ignore;

pub use error::RoutingError;
pub use finder::RouteFinder;
pub use ignore::IgnoreSet;
