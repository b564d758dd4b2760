//! Network clients.
//!
//! This module contains:
//!
//! - [`rest`] - HTTP client and the order book [`SnapshotLoader`]
//! - [`websocket`] - the reconnecting [`StreamConnection`]
//! - [`backoff`] - exponential backoff with jitter shared by both

pub mod backoff;
pub mod rest;
pub mod websocket;

pub use backoff::BackoffConfig;
pub use rest::{RestClient, SnapshotLoader};
pub use websocket::{ConnectionState, StreamConnection, StreamEvent};
