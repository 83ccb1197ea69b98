//! [`LightningRpc`](lnprobe_core::LightningRpc) implementations.

pub mod lnd_rest;
pub mod scripted;
