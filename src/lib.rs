//! # orderbook-sync
//!
//! Live order book and order lifecycle sync for one market view, built on a
//! REST snapshot plus a WebSocket delta stream.
//!
//! ## Features
//!
//! - **Snapshot + deltas** - the book is bootstrapped over REST and kept
//!   current from the stream; deltas that arrive early are buffered and
//!   replayed
//! - **Subscription diffing** - changing market or account sends only the
//!   unsubscribes and subscribes that differ
//! - **Reconnects** - exponential backoff with jitter, then subscriptions are
//!   replayed and the book resynchronized
//! - **Order notifications** - at most one per order and state
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use orderbook_sync::{Config, MarketView};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), orderbook_sync::Error> {
//!     let config = Config::new("https://api.example.com", "wss://api.example.com/ws");
//!     let (view, mut notifications) = MarketView::create(config)?;
//!
//!     view.set_context(Some(1), Some("0xabc".to_string()))?;
//!
//!     while let Some(note) = notifications.recv().await {
//!         println!("{}", note.message);
//!         let book = view.book();
//!         println!("{} bids, {} asks", book.bids.len(), book.asks.len());
//!     }
//!
//!     view.teardown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Price Representation
//!
//! Prices and sizes are [`rust_decimal::Decimal`]. The wire carries them as
//! decimal strings; a size of zero removes the level.
//!
//! ## Architecture
//!
//! - [`client`] - REST snapshot loader and the reconnecting stream connection
//! - [`types`] - wire and domain types
//! - [`orderbook`] - the sorted book and its single-market store
//! - [`router`] - parses stream frames into typed events
//! - [`subscription`] - desired-subscription diffing
//! - [`notifier`] - deduplicated order notifications
//! - [`sync`] - the reducer and the [`MarketView`] task that drives it
//! - [`config`] - settings and validation
//! - [`error`] - error types for the crate

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod notifier;
pub mod orderbook;
pub mod router;
pub mod subscription;
pub mod sync;
pub mod types;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use error::Error;
pub use notifier::{Notification, NotificationLevel};
pub use sync::{MarketView, ViewStatus};

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
