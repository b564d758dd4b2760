//! Wire and domain types for the order book stream.
//!
//! This module contains Rust types that correspond to the REST snapshot
//! response, the stream commands, and the stream events.
//!
//! - [`order`] - Sides, order states and order events
//! - [`market`] - Price levels, snapshots and deltas
//! - [`messages`] - Stream commands and inbound message envelopes

pub mod market;
pub mod messages;
pub mod order;
pub(crate) mod serde_util;

pub use market::{OrderBookSnapshot, PriceLevel, PriceLevelUpdate};
pub use messages::{Channel, Method, WsCommand};
pub use order::{FillEvent, OrderEvent, OrderState, Side};

use rust_decimal::Decimal;

/// Price of one unit of base asset in quote terms.
///
/// Held as an exact decimal: on-chain prices are integer tick counts and must
/// survive the round trip through JSON without floating-point loss.
pub type Price = Decimal;

/// Aggregate resting size at one price level.
pub type Size = Decimal;

/// Market identifier (numeric on chain, sometimes sent as a string)
pub type MarketId = u64;

/// Order identifier unique within a market.
///
/// On-chain order ids are 128-bit, so `u64` is not enough.
pub type MarketOrderId = u128;

/// Connected wallet / account address
pub type AccountAddress = String;
