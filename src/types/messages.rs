//! Stream message types.
//!
//! This module contains the commands sent to the stream server and the raw
//! envelopes and payloads received from it. Turning payloads into typed
//! events is the job of [`crate::router::EventRouter`].

use serde::{Deserialize, Serialize};

use super::order::Side;
use super::serde_util;
use super::{AccountAddress, MarketId, MarketOrderId, Price, Size};

/// Named category of stream updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Price-level deltas for one market
    PriceLevels,
    /// Order-state transitions for one market and account
    Orders,
    /// Fills for one market and account
    Fills,
}

impl Channel {
    /// Wire name of the channel
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::PriceLevels => "price_levels",
            Channel::Orders => "orders",
            Channel::Fills => "fills",
        }
    }

    /// Whether the channel is scoped to an account
    pub fn is_account_scoped(self) -> bool {
        matches!(self, Channel::Orders | Channel::Fills)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Start receiving a channel
    Subscribe,
    /// Stop receiving a channel
    Unsubscribe,
}

/// Command sent to the stream server.
///
/// The protocol is fire-and-forget: the server never acknowledges commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WsCommand {
    /// Subscribe or unsubscribe
    pub method: Method,
    /// Target channel
    pub channel: Channel,
    /// Channel scope
    pub params: CommandParams,
}

/// Scope of a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandParams {
    /// Market to (un)subscribe
    pub market_id: MarketId,
    /// Account, for account-scoped channels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_address: Option<AccountAddress>,
}

impl WsCommand {
    /// Create a subscribe command
    pub fn subscribe(
        channel: Channel,
        market_id: MarketId,
        user_address: Option<AccountAddress>,
    ) -> Self {
        Self {
            method: Method::Subscribe,
            channel,
            params: CommandParams {
                market_id,
                user_address,
            },
        }
    }

    /// Create an unsubscribe command
    pub fn unsubscribe(
        channel: Channel,
        market_id: MarketId,
        user_address: Option<AccountAddress>,
    ) -> Self {
        Self {
            method: Method::Unsubscribe,
            channel,
            params: CommandParams {
                market_id,
                user_address,
            },
        }
    }
}

/// Envelope of every server → client message
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Event kind; only `"update"` is defined
    pub event: String,
    /// Channel name, kept raw so unknown channels can be reported
    pub channel: String,
    /// Channel-specific payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Payload of a `price_levels` update
#[derive(Debug, Clone, Deserialize)]
pub struct PriceLevelData {
    /// Side that changed
    pub side: Side,
    /// Level price
    pub price: Price,
    /// New absolute size at that price
    pub size: Size,
    /// Market, when the server tags deltas explicitly
    #[serde(default, with = "serde_util::opt_u64_lenient")]
    pub market_id: Option<MarketId>,
}

/// Payload of an `orders` update
#[derive(Debug, Clone, Deserialize)]
pub struct OrderData {
    /// Order ID within the market
    #[serde(with = "serde_util::u128_lenient")]
    pub market_order_id: MarketOrderId,
    /// New order state, parsed leniently by the router
    pub order_state: String,
    /// Market the order belongs to
    #[serde(default, with = "serde_util::opt_u64_lenient")]
    pub market_id: Option<MarketId>,
    /// Side of the order
    #[serde(default)]
    pub side: Option<Side>,
    /// Remaining size
    #[serde(default)]
    pub size: Option<Size>,
    /// Limit price
    #[serde(default)]
    pub price: Option<Price>,
    /// Owner of the order
    #[serde(default)]
    pub user_address: Option<AccountAddress>,
    /// Custodian capability ID, if any
    #[serde(default, with = "serde_util::opt_u64_lenient")]
    pub custodian_id: Option<u64>,
}

/// Payload of a `fills` update
#[derive(Debug, Clone, Deserialize)]
pub struct FillData {
    /// Maker order that was filled
    #[serde(with = "serde_util::u128_lenient")]
    pub maker_order_id: MarketOrderId,
    /// Maker account
    #[serde(default)]
    pub maker: Option<AccountAddress>,
    /// Side of the maker order
    #[serde(default)]
    pub maker_side: Option<Side>,
    /// Filled size
    pub size: Size,
    /// Fill price
    pub price: Price,
    /// Order state after the fill, if attached
    #[serde(default)]
    pub order_state: Option<String>,
}
