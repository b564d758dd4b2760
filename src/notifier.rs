//! At-most-once user notifications for order lifecycle changes.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::types::order::{OrderEvent, OrderState};
use crate::types::MarketOrderId;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    /// Neutral information
    Info,
    /// Positive outcome
    Success,
    /// Something the user should look at
    Warning,
}

/// A user-facing notice about one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Order the notice is about
    pub market_order_id: MarketOrderId,
    /// State that triggered it
    pub order_state: OrderState,
    /// Severity
    pub level: NotificationLevel,
    /// Human-readable text
    pub message: String,
}

/// Maps order-state transitions to notifications, each
/// `(market_order_id, order_state)` pair at most once.
///
/// The record lives as long as the account-scoped subscription it serves;
/// call [`clear`](Self::clear) when that subscription is torn down.
#[derive(Debug, Default)]
pub struct OrderLifecycleNotifier {
    seen: FxHashSet<(MarketOrderId, OrderState)>,
}

impl OrderLifecycleNotifier {
    /// Create a notifier with an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` and return its notification, or `None` if this pair
    /// was already notified or the state is not one users are told about
    pub fn handle(&mut self, event: &OrderEvent) -> Option<Notification> {
        let (level, verb) = match event.order_state {
            OrderState::Open => (NotificationLevel::Info, "placed"),
            OrderState::Filled => (NotificationLevel::Success, "filled"),
            OrderState::Cancelled => (NotificationLevel::Warning, "cancelled"),
            OrderState::Evicted => (NotificationLevel::Warning, "evicted"),
            OrderState::Unknown => {
                trace!(order_id = %event.market_order_id, "Ignoring unknown order state");
                return None;
            }
        };

        if !self.seen.insert((event.market_order_id, event.order_state)) {
            trace!(
                order_id = %event.market_order_id,
                state = %event.order_state,
                "Duplicate order event"
            );
            return None;
        }

        debug!(order_id = %event.market_order_id, state = %event.order_state, "Order notification");
        Some(Notification {
            market_order_id: event.market_order_id,
            order_state: event.order_state,
            level,
            message: format!("Order {} {}", event.market_order_id, verb),
        })
    }

    /// Forget every recorded pair
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Number of recorded pairs
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_open_filled_yields_two() {
        let mut notifier = OrderLifecycleNotifier::new();

        let notes: Vec<_> = [OrderState::Open, OrderState::Open, OrderState::Filled]
            .into_iter()
            .filter_map(|state| notifier.handle(&OrderEvent::new(11, state)))
            .collect();

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].order_state, OrderState::Open);
        assert_eq!(notes[0].level, NotificationLevel::Info);
        assert_eq!(notes[1].order_state, OrderState::Filled);
        assert_eq!(notes[1].level, NotificationLevel::Success);
    }

    #[test]
    fn test_identical_input_twice() {
        let mut notifier = OrderLifecycleNotifier::new();
        let event = OrderEvent::new(3, OrderState::Cancelled);

        let first = notifier.handle(&event).unwrap();
        assert_eq!(first.level, NotificationLevel::Warning);
        assert!(first.message.contains('3'));
        assert!(notifier.handle(&event).is_none());
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_levels_per_state() {
        let mut notifier = OrderLifecycleNotifier::new();
        let evicted = notifier.handle(&OrderEvent::new(1, OrderState::Evicted)).unwrap();
        assert_eq!(evicted.level, NotificationLevel::Warning);
        assert!(notifier.handle(&OrderEvent::new(1, OrderState::Unknown)).is_none());
        assert_eq!(notifier.len(), 1);
    }

    #[test]
    fn test_clear_allows_renotify() {
        let mut notifier = OrderLifecycleNotifier::new();
        let event = OrderEvent::new(u128::MAX, OrderState::Open);

        assert!(notifier.handle(&event).is_some());
        notifier.clear();
        assert!(notifier.is_empty());
        assert!(notifier.handle(&event).is_some());
    }
}
