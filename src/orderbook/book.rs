//! Core orderbook data structure.
//!
//! This implementation uses `BTreeMap` for sorted price levels, providing:
//!
//! - O(log n) insertion, deletion, and lookup
//! - O(log n) access to best bid/ask (via `last_key_value` / `first_key_value`)
//! - Ordered iteration for depth-of-book queries
//!
//! Keys are unique by construction, so each side is always strictly
//! monotonic with no duplicate prices.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::error::Error;
use crate::types::market::{OrderBookSnapshot, PriceLevel};
use crate::types::order::Side;
use crate::types::{MarketId, Price, Size};

/// Sorted order book for a single market.
///
/// Every update carries the new absolute size of one level: an existing
/// price has its size replaced in place, a new price is inserted at its
/// sorted position, and a size of zero removes the level.
///
/// # Thread Safety
///
/// This struct is `Send + Sync` but not internally synchronized. For
/// concurrent access, wrap in `parking_lot::RwLock` or `Arc<Mutex>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Orderbook {
    /// Market the book belongs to
    market_id: MarketId,

    /// Bid levels: price -> size
    /// Sorted ascending by price (best bid = highest = last)
    bids: BTreeMap<Price, Size>,

    /// Ask levels: price -> size
    /// Sorted ascending by price (best ask = lowest = first)
    asks: BTreeMap<Price, Size>,
}

impl Orderbook {
    /// Create a new empty orderbook for the given market
    #[must_use]
    pub fn new(market_id: MarketId) -> Self {
        Self {
            market_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Build a book from a snapshot, skipping zero-size levels
    ///
    /// Levels with a non-positive price or a negative size are dropped
    /// with a warning, as for live updates.
    #[must_use]
    pub fn from_snapshot(snapshot: &OrderBookSnapshot) -> Self {
        let mut book = Self::new(snapshot.market_id);
        for (side, levels) in [(Side::Buy, &snapshot.bids), (Side::Sell, &snapshot.asks)] {
            for level in levels {
                if let Err(e) = book.set_level(side, level.price, level.size) {
                    warn!(market_id = snapshot.market_id, error = %e, "Skipping snapshot level");
                }
            }
        }
        book
    }

    /// Get the market ID
    #[must_use]
    pub const fn market_id(&self) -> MarketId {
        self.market_id
    }

    /// Set a price level to an absolute size
    ///
    /// Size zero removes the level; an existing price keeps its position and
    /// has its size replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`] for a non-positive price or a negative
    /// size. The book is left unchanged.
    pub fn set_level(&mut self, side: Side, price: Price, size: Size) -> Result<(), Error> {
        validate_level(price, size)?;

        let book = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };

        if size.is_zero() {
            book.remove(&price);
        } else {
            book.insert(price, size);
        }
        Ok(())
    }

    /// Get the size resting at `price` on `side`
    #[must_use]
    pub fn size_at(&self, side: Side, price: Price) -> Option<Size> {
        match side {
            Side::Buy => self.bids.get(&price).copied(),
            Side::Sell => self.asks.get(&price).copied(),
        }
    }

    /// Get the best bid (highest price)
    ///
    /// Returns `(price, size)` or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<(Price, Size)> {
        self.bids.last_key_value().map(|(&p, &s)| (p, s))
    }

    /// Get the best ask (lowest price)
    ///
    /// Returns `(price, size)` or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<(Price, Size)> {
        self.asks.first_key_value().map(|(&p, &s)| (p, s))
    }

    /// Get the mid price
    ///
    /// Returns the average of best bid and best ask, or `None` if either is missing.
    #[must_use]
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Get the spread (best ask minus best bid)
    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    /// Check if the book is crossed (best bid >= best ask)
    ///
    /// This shouldn't happen in a healthy market but is useful for validation.
    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid >= ask,
            _ => false,
        }
    }

    /// Get all bid levels, sorted by price descending (best first)
    pub fn bids(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids.iter().rev().map(|(&p, &s)| PriceLevel::new(p, s))
    }

    /// Get all ask levels, sorted by price ascending (best first)
    pub fn asks(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks.iter().map(|(&p, &s)| PriceLevel::new(p, s))
    }

    /// Get the top N bid levels
    #[must_use]
    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids().take(n).collect()
    }

    /// Get the top N ask levels
    #[must_use]
    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks().take(n).collect()
    }

    /// Get total bid size
    #[must_use]
    pub fn total_bid_size(&self) -> Size {
        self.bids.values().sum()
    }

    /// Get total ask size
    #[must_use]
    pub fn total_ask_size(&self) -> Size {
        self.asks.values().sum()
    }

    /// Owned copy of the book in snapshot form
    #[must_use]
    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot::new(
            self.market_id,
            self.bids().collect(),
            self.asks().collect(),
        )
    }

    /// Clear both sides
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    /// Check if the orderbook is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get the number of price levels as `(bids, asks)`
    #[must_use]
    pub fn num_levels(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }
}

/// Reject a non-positive price or a negative size
pub(crate) fn validate_level(price: Price, size: Size) -> Result<(), Error> {
    if price <= Decimal::ZERO || size < Decimal::ZERO {
        return Err(Error::InvalidLevel { price, size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded() -> Orderbook {
        Orderbook::from_snapshot(&OrderBookSnapshot::new(
            1,
            vec![PriceLevel::new(dec!(100), dec!(5))],
            vec![PriceLevel::new(dec!(101), dec!(3))],
        ))
    }

    #[test]
    fn test_new_orderbook() {
        let book = Orderbook::new(7);
        assert_eq!(book.market_id(), 7);
        assert!(book.is_empty());
        assert_eq!(book.num_levels(), (0, 0));
    }

    #[test]
    fn test_insert_then_replace_keeps_position() {
        let mut book = seeded();

        book.set_level(Side::Buy, dec!(99), dec!(2)).unwrap();
        assert_eq!(
            book.top_bids(10),
            vec![
                PriceLevel::new(dec!(100), dec!(5)),
                PriceLevel::new(dec!(99), dec!(2)),
            ]
        );

        book.set_level(Side::Buy, dec!(100), dec!(7)).unwrap();
        assert_eq!(
            book.top_bids(10),
            vec![
                PriceLevel::new(dec!(100), dec!(7)),
                PriceLevel::new(dec!(99), dec!(2)),
            ]
        );
        assert_eq!(book.top_asks(10), vec![PriceLevel::new(dec!(101), dec!(3))]);
    }

    #[test]
    fn test_zero_size_removes_level() {
        let mut book = seeded();
        book.set_level(Side::Sell, dec!(101), dec!(0)).unwrap();
        assert_eq!(book.best_ask(), None);

        // Removing a missing level is a no-op
        book.set_level(Side::Sell, dec!(150), dec!(0)).unwrap();
        assert_eq!(book.num_levels(), (1, 0));
    }

    #[test]
    fn test_snapshot_skips_zero_levels() {
        let book = Orderbook::from_snapshot(&OrderBookSnapshot::new(
            2,
            vec![
                PriceLevel::new(dec!(10), dec!(0)),
                PriceLevel::new(dec!(9), dec!(1)),
            ],
            vec![],
        ));
        assert_eq!(book.num_levels(), (1, 0));
        assert_eq!(book.best_bid(), Some((dec!(9), dec!(1))));
    }

    #[test]
    fn test_snapshot_drops_invalid_levels() {
        let book = Orderbook::from_snapshot(&OrderBookSnapshot::new(
            3,
            vec![
                PriceLevel::new(dec!(0), dec!(4)),
                PriceLevel::new(dec!(9), dec!(1)),
                PriceLevel::new(dec!(8), dec!(-2)),
            ],
            vec![
                PriceLevel::new(dec!(-1), dec!(1)),
                PriceLevel::new(dec!(11), dec!(2)),
            ],
        ));

        assert_eq!(book.num_levels(), (1, 1));
        assert_eq!(book.best_bid(), Some((dec!(9), dec!(1))));
        assert_eq!(book.best_ask(), Some((dec!(11), dec!(2))));
        assert!(book.snapshot().is_well_ordered());
    }

    #[test]
    fn test_invalid_levels_rejected() {
        let mut book = seeded();
        let before = book.clone();

        assert!(matches!(
            book.set_level(Side::Buy, dec!(98), dec!(-1)),
            Err(Error::InvalidLevel { .. })
        ));
        assert!(book.set_level(Side::Buy, dec!(0), dec!(1)).is_err());
        assert!(book.set_level(Side::Sell, dec!(-5), dec!(1)).is_err());
        assert_eq!(book, before);
    }

    #[test]
    fn test_ordering_invariant_under_many_updates() {
        let mut book = Orderbook::new(1);
        let prices = [dec!(5), dec!(1), dec!(9), dec!(3), dec!(7), dec!(3), dec!(5.5)];

        for (i, price) in prices.iter().enumerate() {
            let size = Decimal::from(i as u64 % 3);
            book.set_level(Side::Buy, *price, size).unwrap();
            book.set_level(Side::Sell, *price + dec!(10), size).unwrap();

            let snapshot = book.snapshot();
            assert!(snapshot.is_well_ordered());
            assert!(snapshot.bids.iter().all(|l| !l.size.is_zero()));
        }
    }

    #[test]
    fn test_mid_price_and_spread() {
        let book = seeded();
        assert_eq!(book.mid_price(), Some(dec!(100.5)));
        assert_eq!(book.spread(), Some(dec!(1)));
        assert!(!book.is_crossed());
    }

    #[test]
    fn test_crossed_book() {
        let mut book = seeded();
        book.set_level(Side::Buy, dec!(102), dec!(1)).unwrap();
        assert!(book.is_crossed());
    }

    #[test]
    fn test_totals_and_clear() {
        let mut book = seeded();
        book.set_level(Side::Buy, dec!(99.5), dec!(0.25)).unwrap();

        assert_eq!(book.total_bid_size(), dec!(5.25));
        assert_eq!(book.total_ask_size(), dec!(3));
        assert_eq!(book.size_at(Side::Buy, dec!(99.5)), Some(dec!(0.25)));

        book.clear();
        assert!(book.is_empty());
        assert_eq!(book.market_id(), 1);
    }
}
