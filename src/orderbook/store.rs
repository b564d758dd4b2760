//! Single-market order book store with snapshot bootstrapping.
//!
//! [`OrderBookStore`] owns the book for the market currently being viewed.
//! Switching markets puts the store in [`OrderbookState::WaitingForSnapshot`];
//! deltas for the new market that race ahead of the snapshot are buffered and
//! replayed once it lands. Deltas for any other market are dropped.
//!
//! Deltas that do not name their market are only attributed to the current
//! one by the router. Once the stream has carried another market, such a
//! delta may still belong to it, so it is not buffered until a resync; see
//! [`OrderBookStore::apply_scoped_update`].
//!
//! # Example
//!
//! ```rust
//! use orderbook_sync::orderbook::{OrderBookStore, UpdateOutcome};
//! use orderbook_sync::types::{OrderBookSnapshot, PriceLevel, PriceLevelUpdate, Side};
//! use rust_decimal::Decimal;
//!
//! let mut store = OrderBookStore::new(1024);
//! store.begin_market(1);
//!
//! // Arrives before the snapshot and is held back
//! let update = PriceLevelUpdate::new(1, Side::Buy, Decimal::from(99), Decimal::from(2));
//! assert_eq!(store.apply_update(&update).unwrap(), UpdateOutcome::Buffered);
//!
//! let snapshot = OrderBookSnapshot::new(
//!     1,
//!     vec![PriceLevel::new(Decimal::from(100), Decimal::from(5))],
//!     vec![],
//! );
//! assert_eq!(store.load_snapshot(snapshot), 1);
//! assert_eq!(store.book().num_levels(), (2, 0));
//! ```

use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::types::market::{OrderBookSnapshot, PriceLevelUpdate};
use crate::types::MarketId;

use super::book::{validate_level, Orderbook};

/// State of the store's book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderbookState {
    /// No market selected
    Empty,
    /// Market selected, snapshot not yet loaded
    WaitingForSnapshot,
    /// Snapshot loaded and receiving updates
    Synchronized,
}

/// What happened to an update passed to [`OrderBookStore::apply_update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Merged into the book
    Applied,
    /// Held until the snapshot arrives
    Buffered,
    /// Targets a market the store does not own; discarded
    StaleMarket,
    /// Carries no market and may predate the last market switch; discarded
    Unattributed,
}

/// Owner of the order book for the currently viewed market.
///
/// Not internally synchronized; all mutation is expected to come from a
/// single task.
#[derive(Debug)]
pub struct OrderBookStore {
    book: Orderbook,
    market_id: Option<MarketId>,
    state: OrderbookState,
    pending: VecDeque<PriceLevelUpdate>,
    max_buffered: usize,
    /// No other market has been owned since creation or the last resync,
    /// so untagged deltas can be buffered while waiting
    scope_reliable: bool,
}

impl OrderBookStore {
    /// Create an empty store holding at most `max_buffered` early updates
    pub fn new(max_buffered: usize) -> Self {
        Self {
            book: Orderbook::default(),
            market_id: None,
            state: OrderbookState::Empty,
            pending: VecDeque::new(),
            max_buffered,
            scope_reliable: true,
        }
    }

    /// Switch ownership to `market_id` and wait for its snapshot
    ///
    /// Discards the previous book and any buffered updates. When another
    /// market was owned before, only deltas tagged with `market_id` are
    /// buffered until the snapshot lands.
    pub fn begin_market(&mut self, market_id: MarketId) {
        debug!(market_id, "Waiting for orderbook snapshot");
        if self.market_id.is_some() {
            self.scope_reliable = false;
        }
        self.book = Orderbook::new(market_id);
        self.market_id = Some(market_id);
        self.state = OrderbookState::WaitingForSnapshot;
        self.pending.clear();
    }

    /// Replace all state with `snapshot`
    ///
    /// Buffered updates for the same market are replayed in arrival order.
    /// Returns the number of buffered updates applied.
    pub fn load_snapshot(&mut self, snapshot: OrderBookSnapshot) -> usize {
        let market_id = snapshot.market_id;
        let pending = std::mem::take(&mut self.pending);
        let carried_over = self.market_id == Some(market_id);

        self.book = Orderbook::from_snapshot(&snapshot);
        self.market_id = Some(market_id);
        self.state = OrderbookState::Synchronized;

        let mut replayed = 0;
        if carried_over {
            for update in pending {
                match self.book.set_level(update.side, update.price, update.size) {
                    Ok(()) => replayed += 1,
                    Err(e) => warn!(market_id, error = %e, "Dropping buffered update"),
                }
            }
        }

        let (bids, asks) = self.book.num_levels();
        debug!(market_id, bids, asks, replayed, "Orderbook snapshot loaded");
        replayed
    }

    /// Merge one price-level delta
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLevel`] for a non-positive price or a negative
    /// size; nothing is applied or buffered.
    pub fn apply_update(&mut self, update: &PriceLevelUpdate) -> Result<UpdateOutcome, Error> {
        self.merge(update, true)
    }

    /// Merge a delta whose market was inferred rather than carried on the
    /// wire
    ///
    /// Applied like [`apply_update`](Self::apply_update) once synchronized.
    /// While waiting for the snapshot of a market switched to from another
    /// one, the stream may still deliver deltas of the previous market, so
    /// the delta is discarded as [`UpdateOutcome::Unattributed`]. For the
    /// first market, and after a [`resync`](Self::resync), the stream only
    /// carries the current market and the delta is buffered.
    ///
    /// # Errors
    ///
    /// Same as [`apply_update`](Self::apply_update).
    pub fn apply_scoped_update(
        &mut self,
        update: &PriceLevelUpdate,
    ) -> Result<UpdateOutcome, Error> {
        self.merge(update, false)
    }

    fn merge(&mut self, update: &PriceLevelUpdate, tagged: bool) -> Result<UpdateOutcome, Error> {
        if self.market_id != Some(update.market_id) {
            trace!(
                market_id = update.market_id,
                current = ?self.market_id,
                "Dropping update for stale market"
            );
            return Ok(UpdateOutcome::StaleMarket);
        }

        validate_level(update.price, update.size)?;

        match self.state {
            OrderbookState::Synchronized => {
                self.book.set_level(update.side, update.price, update.size)?;
                Ok(UpdateOutcome::Applied)
            }
            OrderbookState::WaitingForSnapshot if !tagged && !self.scope_reliable => {
                trace!(market_id = update.market_id, "Dropping untagged update during market switch");
                Ok(UpdateOutcome::Unattributed)
            }
            OrderbookState::WaitingForSnapshot => {
                if self.pending.len() >= self.max_buffered.max(1) {
                    warn!(
                        market_id = update.market_id,
                        capacity = self.max_buffered,
                        "Update buffer full, dropping oldest"
                    );
                    self.pending.pop_front();
                }
                self.pending.push_back(*update);
                Ok(UpdateOutcome::Buffered)
            }
            OrderbookState::Empty => Ok(UpdateOutcome::StaleMarket),
        }
    }

    /// Wait for a fresh snapshot of the current market, keeping the stale
    /// book readable until it arrives
    ///
    /// Returns the market now waiting, if any.
    pub fn resync(&mut self) -> Option<MarketId> {
        let market_id = self.market_id?;
        debug!(market_id, "Orderbook resync requested");
        self.state = OrderbookState::WaitingForSnapshot;
        self.pending.clear();
        self.scope_reliable = true;
        Some(market_id)
    }

    /// Drop the market and everything held for it
    pub fn clear(&mut self) {
        if self.market_id.is_some() {
            self.scope_reliable = false;
        }
        self.book = Orderbook::default();
        self.market_id = None;
        self.state = OrderbookState::Empty;
        self.pending.clear();
    }

    /// Market currently owned, if any
    pub fn market_id(&self) -> Option<MarketId> {
        self.market_id
    }

    /// Current state
    pub fn state(&self) -> OrderbookState {
        self.state
    }

    /// Number of updates waiting for the snapshot
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Read access to the book
    pub fn book(&self) -> &Orderbook {
        &self.book
    }

    /// Owned copy of the current book
    pub fn snapshot(&self) -> OrderBookSnapshot {
        self.book.snapshot()
    }
}
