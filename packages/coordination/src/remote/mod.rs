//! Coordination over HTTP.
//!
//! The coordinator service hosts one [`MemoryEnsemble`](crate::MemoryEnsemble)
//! through a [`RemoteHost`]; services talk to it with a [`RemoteCoordinator`].
//! A long-polled event endpoint delivers fired watches and doubles as the
//! session heartbeat.

mod client;
mod host;
pub mod wire;

pub use client::RemoteCoordinator;
pub use host::RemoteHost;
