//! Order book data types.
//!
//! [`OrderBookSnapshot`] is the authoritative full book for one market, as
//! returned by the REST endpoint and as read back from the local store.
//! [`PriceLevelUpdate`] is a single-level delta from the stream.

use serde::{Deserialize, Serialize};

use super::order::Side;
use super::{MarketId, Price, Size};

/// Resting liquidity at one price on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Level price
    pub price: Price,
    /// Aggregate size at this price
    pub size: Size,
}

impl PriceLevel {
    /// Create a new price level
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Full order book for one market.
///
/// Bids are ordered by descending price, asks by ascending price, with no
/// duplicate prices on either side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Market the book belongs to
    #[serde(deserialize_with = "crate::types::serde_util::u64_lenient::deserialize")]
    pub market_id: MarketId,
    /// Bid levels, best (highest) first
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best (lowest) first
    pub asks: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    /// Create a snapshot from its sides
    pub fn new(market_id: MarketId, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            market_id,
            bids,
            asks,
        }
    }

    /// An empty book for `market_id`
    pub fn empty(market_id: MarketId) -> Self {
        Self::new(market_id, Vec::new(), Vec::new())
    }

    /// Check if both sides are empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Check the ordering invariant: bids strictly descending, asks strictly
    /// ascending
    pub fn is_well_ordered(&self) -> bool {
        self.bids.windows(2).all(|w| w[0].price > w[1].price)
            && self.asks.windows(2).all(|w| w[0].price < w[1].price)
    }
}

/// REST response body of `GET /markets/{id}/orderbook`
#[derive(Debug, Clone, Deserialize)]
pub struct OrderbookResponse {
    /// Bid levels
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    /// Ask levels
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
}

impl OrderbookResponse {
    /// Attach the market the response was requested for
    pub fn into_snapshot(self, market_id: MarketId) -> OrderBookSnapshot {
        OrderBookSnapshot::new(market_id, self.bids, self.asks)
    }
}

/// A delta targeting exactly one price level.
///
/// `size` is the new absolute size of the level, not an increment. A size of
/// zero removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevelUpdate {
    /// Market the delta belongs to
    pub market_id: MarketId,
    /// Side of the book
    pub side: Side,
    /// Level price
    pub price: Price,
    /// New size at that price
    pub size: Size,
}

impl PriceLevelUpdate {
    /// Create a new update
    pub fn new(market_id: MarketId, side: Side, price: Price, size: Size) -> Self {
        Self {
            market_id,
            side,
            price,
            size,
        }
    }
}
