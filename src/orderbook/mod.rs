//! Order book state for the market being viewed.
//!
//! - [`Orderbook`] - sorted bid/ask levels with the absolute-size merge rule
//! - [`OrderBookStore`] - single-market owner with snapshot bootstrapping,
//!   early-update buffering and the stale-market guard
//!
//! # Example
//!
//! ```rust
//! use orderbook_sync::orderbook::Orderbook;
//! use orderbook_sync::types::Side;
//! use rust_decimal::Decimal;
//!
//! let mut book = Orderbook::new(1);
//!
//! book.set_level(Side::Buy, Decimal::from(55), Decimal::from(100)).unwrap();
//! book.set_level(Side::Buy, Decimal::from(45), Decimal::from(50)).unwrap();
//!
//! if let Some((price, size)) = book.best_bid() {
//!     println!("Best bid: {} @ {}", size, price);
//! }
//! ```

pub mod book;
pub mod store;

pub use book::Orderbook;
pub use store::{OrderBookStore, OrderbookState, UpdateOutcome};
