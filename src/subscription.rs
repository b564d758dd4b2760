//! Desired-subscription tracking.
//!
//! [`SubscriptionManager`] derives the set of server-side subscriptions from
//! the current `(market, account)` context and turns every context change
//! into a minimal [`SubscriptionDiff`]. The protocol has no acknowledgements,
//! so the manager is optimistic: once a diff is emitted the new set is
//! considered live.

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::types::messages::{Channel, WsCommand};
use crate::types::{AccountAddress, MarketId};

/// One server-side subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    /// Channel
    pub channel: Channel,
    /// Market the channel is scoped to
    pub market_id: MarketId,
    /// Account, for `orders` and `fills`
    pub account_address: Option<AccountAddress>,
}

impl SubscriptionKey {
    /// `price_levels` for a market
    pub fn price_levels(market_id: MarketId) -> Self {
        Self {
            channel: Channel::PriceLevels,
            market_id,
            account_address: None,
        }
    }

    /// An account-scoped channel for a market
    pub fn account(channel: Channel, market_id: MarketId, account: AccountAddress) -> Self {
        Self {
            channel,
            market_id,
            account_address: Some(account),
        }
    }

    /// Subscribe command for this key
    pub fn subscribe(&self) -> WsCommand {
        WsCommand::subscribe(self.channel, self.market_id, self.account_address.clone())
    }

    /// Unsubscribe command for this key
    pub fn unsubscribe(&self) -> WsCommand {
        WsCommand::unsubscribe(self.channel, self.market_id, self.account_address.clone())
    }
}

/// Commands needed to move from one desired set to the next
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDiff {
    /// Keys to tear down, in discovery order
    pub unsubscribe: Vec<SubscriptionKey>,
    /// Keys to set up, in discovery order
    pub subscribe: Vec<SubscriptionKey>,
}

impl SubscriptionDiff {
    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.unsubscribe.is_empty() && self.subscribe.is_empty()
    }

    /// Commands to send: every unsubscribe, then every subscribe
    pub fn commands(&self) -> Vec<WsCommand> {
        self.unsubscribe
            .iter()
            .map(SubscriptionKey::unsubscribe)
            .chain(self.subscribe.iter().map(SubscriptionKey::subscribe))
            .collect()
    }

    /// Whether any account-scoped key is being torn down
    pub fn drops_account_channel(&self) -> bool {
        self.unsubscribe
            .iter()
            .any(|key| key.channel.is_account_scoped())
    }
}

/// Tracks the desired subscription set for the current context
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    desired: Vec<SubscriptionKey>,
    previous: Vec<SubscriptionKey>,
}

impl SubscriptionManager {
    /// Create a manager with no subscriptions
    pub fn new() -> Self {
        Self::default()
    }

    /// Desired set for a context, in discovery order
    pub fn desired_for(
        market_id: Option<MarketId>,
        account: Option<&AccountAddress>,
    ) -> Vec<SubscriptionKey> {
        let Some(market_id) = market_id else {
            return Vec::new();
        };

        let mut keys = vec![SubscriptionKey::price_levels(market_id)];
        if let Some(account) = account {
            keys.push(SubscriptionKey::account(Channel::Orders, market_id, account.clone()));
            keys.push(SubscriptionKey::account(Channel::Fills, market_id, account.clone()));
        }
        keys
    }

    /// Recompute the desired set and return what changed
    pub fn set_context(
        &mut self,
        market_id: Option<MarketId>,
        account: Option<&AccountAddress>,
    ) -> SubscriptionDiff {
        let next = Self::desired_for(market_id, account);
        let diff = diff(&self.desired, &next);

        if !diff.is_empty() {
            debug!(
                unsubscribe = diff.unsubscribe.len(),
                subscribe = diff.subscribe.len(),
                "Subscription set changed"
            );
        }

        self.previous = std::mem::replace(&mut self.desired, next);
        diff
    }

    /// Current desired set, in discovery order
    pub fn desired(&self) -> &[SubscriptionKey] {
        &self.desired
    }

    /// Desired set before the last context change
    pub fn previous(&self) -> &[SubscriptionKey] {
        &self.previous
    }

    /// Subscribe commands for the whole desired set, for a fresh connection
    pub fn replay(&self) -> Vec<WsCommand> {
        self.desired.iter().map(SubscriptionKey::subscribe).collect()
    }

    /// Drop every subscription and return the unsubscribe commands
    pub fn teardown(&mut self) -> Vec<WsCommand> {
        let commands = self.desired.iter().map(SubscriptionKey::unsubscribe).collect();
        self.previous = std::mem::take(&mut self.desired);
        commands
    }
}

fn diff(old: &[SubscriptionKey], new: &[SubscriptionKey]) -> SubscriptionDiff {
    let old_set: FxHashSet<&SubscriptionKey> = old.iter().collect();
    let new_set: FxHashSet<&SubscriptionKey> = new.iter().collect();

    SubscriptionDiff {
        unsubscribe: old
            .iter()
            .filter(|key| !new_set.contains(key))
            .cloned()
            .collect(),
        subscribe: new
            .iter()
            .filter(|key| !old_set.contains(key))
            .cloned()
            .collect(),
    }
}
