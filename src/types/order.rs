//! Order-related types.
//!
//! Sides of the book, the lifecycle states an order passes through, and the
//! typed events produced from the `orders` and `fills` channels.

use serde::{Deserialize, Serialize};

use super::{AccountAddress, MarketId, MarketOrderId, Price, Size};

/// Side of the book a level or order rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bids, sorted best-first by descending price
    #[serde(alias = "bid")]
    Buy,
    /// Asks, sorted best-first by ascending price
    #[serde(alias = "ask")]
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Wire name of the side
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Lifecycle state of an order.
///
/// Parsed leniently: any state the server adds later maps to
/// [`OrderState::Unknown`] instead of failing the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderState {
    /// Order is resting on the book
    Open,
    /// Order has been fully executed
    Filled,
    /// Order was cancelled by its owner
    Cancelled,
    /// Order was evicted from the book by the matching engine
    Evicted,
    /// State this client does not know about
    Unknown,
}

impl OrderState {
    /// Wire name of the state (`"unknown"` for unrecognized states)
    pub fn as_str(self) -> &'static str {
        match self {
            OrderState::Open => "open",
            OrderState::Filled => "filled",
            OrderState::Cancelled => "cancelled",
            OrderState::Evicted => "evicted",
            OrderState::Unknown => "unknown",
        }
    }

    /// Whether the order can no longer change
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Evicted
        )
    }
}

impl From<&str> for OrderState {
    fn from(s: &str) -> Self {
        match s {
            "open" => OrderState::Open,
            "filled" => OrderState::Filled,
            "cancelled" | "canceled" => OrderState::Cancelled,
            "evicted" => OrderState::Evicted,
            _ => OrderState::Unknown,
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order-state transition delivered on the `orders` channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    /// Order ID within the market
    pub market_order_id: MarketOrderId,
    /// New state of the order
    pub order_state: OrderState,
    /// Market the order belongs to, when the server includes it
    pub market_id: Option<MarketId>,
    /// Side of the order, when the server includes it
    pub side: Option<Side>,
    /// Remaining size, when the server includes it
    pub size: Option<Size>,
    /// Limit price, when the server includes it
    pub price: Option<Price>,
    /// Owner of the order, when the server includes it
    pub user_address: Option<AccountAddress>,
}

impl OrderEvent {
    /// Create an event carrying only the fields notifications depend on
    pub fn new(market_order_id: MarketOrderId, order_state: OrderState) -> Self {
        Self {
            market_order_id,
            order_state,
            market_id: None,
            side: None,
            size: None,
            price: None,
            user_address: None,
        }
    }
}

/// A fill delivered on the `fills` channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillEvent {
    /// Maker order that was (partially) filled
    pub maker_order_id: MarketOrderId,
    /// Maker account
    pub maker: Option<AccountAddress>,
    /// Side of the maker order
    pub maker_side: Option<Side>,
    /// Filled size
    pub size: Size,
    /// Fill price
    pub price: Price,
    /// Order state after the fill, if the server attaches one
    pub order_state: Option<OrderState>,
}

impl FillEvent {
    /// Lifecycle event carried by this fill, if any
    pub fn order_event(&self) -> Option<OrderEvent> {
        self.order_state.map(|state| {
            let mut event = OrderEvent::new(self.maker_order_id, state);
            event.side = self.maker_side;
            event.user_address = self.maker.clone();
            event
        })
    }
}
