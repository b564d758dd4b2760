//! Parsing of inbound stream messages into typed events.
//!
//! Every server message is an `{event, channel, data}` envelope. The router
//! validates the envelope, picks the payload schema by channel and produces
//! an [`Event`]. Anything it cannot understand comes back as a
//! [`ParseError`]; callers log and drop those.

use crate::error::ParseError;
use crate::types::market::PriceLevelUpdate;
use crate::types::messages::{Channel, FillData, InboundMessage, OrderData, PriceLevelData};
use crate::types::order::{FillEvent, OrderEvent, OrderState};
use crate::types::MarketId;

const UPDATE_EVENT: &str = "update";

/// A typed stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Price-level delta tagged with its market, destined for the order
    /// book store
    PriceLevel(PriceLevelUpdate),
    /// Price-level delta without a `market_id`, attributed to the router's
    /// scope
    ScopedPriceLevel(PriceLevelUpdate),
    /// Order-state transition, destined for the notifier
    Order(OrderEvent),
    /// Fill, destined for the notifier when it carries a state
    Fill(FillEvent),
}

impl Event {
    /// Channel the event arrived on
    pub fn channel(&self) -> Channel {
        match self {
            Event::PriceLevel(_) | Event::ScopedPriceLevel(_) => Channel::PriceLevels,
            Event::Order(_) => Channel::Orders,
            Event::Fill(_) => Channel::Fills,
        }
    }
}

/// Stateless apart from the market used for untagged price-level deltas
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    scope: Option<MarketId>,
}

impl EventRouter {
    /// Create a router with no market in scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Market assigned to price-level deltas that carry no `market_id`
    pub fn set_scope(&mut self, market_id: Option<MarketId>) {
        self.scope = market_id;
    }

    /// Current scope
    pub fn scope(&self) -> Option<MarketId> {
        self.scope
    }

    /// Parse one raw text frame
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for invalid JSON, an unknown event or channel,
    /// a payload that does not match its channel, or an untagged price-level
    /// delta with no market in scope.
    pub fn parse(&self, raw: &str) -> Result<Event, ParseError> {
        let message: InboundMessage =
            serde_json::from_str(raw).map_err(|e| ParseError::Malformed(e.to_string()))?;

        if message.event != UPDATE_EVENT {
            return Err(ParseError::UnknownEvent(message.event));
        }

        let channel = match message.channel.as_str() {
            "price_levels" => Channel::PriceLevels,
            "orders" => Channel::Orders,
            "fills" => Channel::Fills,
            _ => return Err(ParseError::UnknownChannel(message.channel)),
        };

        match channel {
            Channel::PriceLevels => {
                let data: PriceLevelData = payload(channel, message.data)?;
                match data.market_id {
                    Some(market_id) => Ok(Event::PriceLevel(PriceLevelUpdate::new(
                        market_id, data.side, data.price, data.size,
                    ))),
                    None => {
                        let market_id = self.scope.ok_or(ParseError::MissingMarketScope)?;
                        Ok(Event::ScopedPriceLevel(PriceLevelUpdate::new(
                            market_id, data.side, data.price, data.size,
                        )))
                    }
                }
            }
            Channel::Orders => {
                let data: OrderData = payload(channel, message.data)?;
                Ok(Event::Order(OrderEvent {
                    market_order_id: data.market_order_id,
                    order_state: OrderState::from(data.order_state.as_str()),
                    market_id: data.market_id,
                    side: data.side,
                    size: data.size,
                    price: data.price,
                    user_address: data.user_address,
                }))
            }
            Channel::Fills => {
                let data: FillData = payload(channel, message.data)?;
                Ok(Event::Fill(FillEvent {
                    maker_order_id: data.maker_order_id,
                    maker: data.maker,
                    maker_side: data.maker_side,
                    size: data.size,
                    price: data.price,
                    order_state: data.order_state.as_deref().map(OrderState::from),
                }))
            }
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    channel: Channel,
    data: serde_json::Value,
) -> Result<T, ParseError> {
    serde_json::from_value(data).map_err(|e| ParseError::InvalidData {
        channel: channel.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::order::Side;
    use rust_decimal_macros::dec;

    fn scoped(market_id: MarketId) -> EventRouter {
        let mut router = EventRouter::new();
        router.set_scope(Some(market_id));
        router
    }

    #[test]
    fn test_price_level_uses_scope() {
        let event = scoped(4)
            .parse(r#"{"event":"update","channel":"price_levels","data":{"side":"buy","price":"99","size":"2"}}"#)
            .unwrap();

        assert_eq!(
            event,
            Event::ScopedPriceLevel(PriceLevelUpdate::new(4, Side::Buy, dec!(99), dec!(2)))
        );
        assert_eq!(event.channel(), Channel::PriceLevels);
    }

    #[test]
    fn test_price_level_tag_overrides_scope() {
        let event = scoped(2)
            .parse(r#"{"event":"update","channel":"price_levels","data":{"side":"ask","price":5,"size":1,"market_id":"1"}}"#)
            .unwrap();

        match event {
            Event::PriceLevel(update) => {
                assert_eq!(update.market_id, 1);
                assert_eq!(update.side, Side::Sell);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_price_level_without_scope() {
        let result = EventRouter::new()
            .parse(r#"{"event":"update","channel":"price_levels","data":{"side":"buy","price":"1","size":"1"}}"#);
        assert_eq!(result, Err(ParseError::MissingMarketScope));
    }

    #[test]
    fn test_order_event() {
        let event = EventRouter::new()
            .parse(r#"{"event":"update","channel":"orders","data":{"market_order_id":"42","order_state":"cancelled","user_address":"0xabc"}}"#)
            .unwrap();

        match event {
            Event::Order(order) => {
                assert_eq!(order.market_order_id, 42);
                assert_eq!(order.order_state, OrderState::Cancelled);
                assert_eq!(order.user_address.as_deref(), Some("0xabc"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_fill_event_state_optional() {
        let router = EventRouter::new();

        let with_state = router
            .parse(r#"{"event":"update","channel":"fills","data":{"maker_order_id":7,"size":"1","price":"10","order_state":"filled"}}"#)
            .unwrap();
        let without_state = router
            .parse(r#"{"event":"update","channel":"fills","data":{"maker_order_id":7,"size":"1","price":"10"}}"#)
            .unwrap();

        assert!(matches!(
            with_state,
            Event::Fill(FillEvent { order_state: Some(OrderState::Filled), .. })
        ));
        assert!(matches!(
            without_state,
            Event::Fill(FillEvent { order_state: None, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_messages() {
        let router = scoped(1);

        assert!(matches!(router.parse("not json"), Err(ParseError::Malformed(_))));
        assert!(matches!(
            router.parse(r#"{"event":"snapshot","channel":"orders","data":{}}"#),
            Err(ParseError::UnknownEvent(_))
        ));
        assert!(matches!(
            router.parse(r#"{"event":"update","channel":"trades","data":{}}"#),
            Err(ParseError::UnknownChannel(_))
        ));
        assert!(matches!(
            router.parse(r#"{"event":"update","channel":"price_levels","data":{"side":"buy","price":"abc","size":"1"}}"#),
            Err(ParseError::InvalidData { .. })
        ));
        assert!(matches!(
            router.parse(r#"{"event":"update","channel":"orders","data":{"order_state":"open"}}"#),
            Err(ParseError::InvalidData { .. })
        ));
    }
}
