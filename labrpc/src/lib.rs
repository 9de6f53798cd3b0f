//! A tiny in-process RPC layer for testing distributed protocols.
//!
//! Services are declared with [`service!`]; every registered server lives
//! behind a [`Network`] router that can drop packages or cut nodes off, and
//! every client call is bounded by a timeout.

pub mod client;
mod macros;
pub mod network;
pub mod server;

pub use anyhow;
pub use async_trait::async_trait;
pub use futures;
pub use log;
pub use rand;
pub use serde;
pub use serde_json;
pub use tokio;

pub use network::{Faults, Network};
