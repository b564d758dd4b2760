//! The sync reducer.
//!
//! [`SyncState::apply`] takes one [`Input`] at a time, updates the store,
//! subscriptions and notification record, and returns the [`Effect`]s the
//! event loop must carry out. It performs no I/O, so every ordering rule can
//! be tested without a network.

use tracing::{debug, warn};

use crate::error::Error;
use crate::notifier::{Notification, OrderLifecycleNotifier};
use crate::orderbook::{OrderBookStore, OrderbookState, UpdateOutcome};
use crate::router::{Event, EventRouter};
use crate::subscription::SubscriptionManager;
use crate::types::market::{OrderBookSnapshot, PriceLevelUpdate};
use crate::types::messages::WsCommand;
use crate::types::order::OrderEvent;
use crate::types::{AccountAddress, MarketId};

/// Something that happened, fed to [`SyncState::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The viewed market or the connected account changed
    ContextChanged {
        /// Market being viewed, if any
        market_id: Option<MarketId>,
        /// Connected account, if any
        account: Option<AccountAddress>,
    },
    /// A snapshot fetch completed
    SnapshotLoaded {
        /// The fetched book
        snapshot: OrderBookSnapshot,
        /// Generation of the [`Effect::FetchSnapshot`] that produced it
        generation: u64,
    },
    /// A snapshot fetch gave up
    SnapshotFailed {
        /// Market that was requested
        market_id: MarketId,
        /// Generation of the [`Effect::FetchSnapshot`] that failed
        generation: u64,
        /// Final error, rendered
        error: String,
    },
    /// A text frame from the stream
    Message(String),
    /// The stream came back after a disconnect
    Reconnected,
    /// The owner is going away
    Teardown,
}

/// Work for the event loop, in the order it must happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a command on the stream
    Send(WsCommand),
    /// Start fetching a snapshot
    ///
    /// Only the result carrying the latest generation is accepted.
    FetchSnapshot {
        /// Market to fetch
        market_id: MarketId,
        /// Echoed back in the result input
        generation: u64,
    },
    /// The readable book changed
    BookChanged,
    /// Deliver a notification
    Notify(Notification),
    /// The snapshot for the current market could not be loaded
    LoadingFailed {
        /// Market that failed
        market_id: MarketId,
        /// Error text for display
        message: String,
    },
}

/// All sync state for one view
#[derive(Debug)]
pub struct SyncState {
    store: OrderBookStore,
    router: EventRouter,
    notifier: OrderLifecycleNotifier,
    subscriptions: SubscriptionManager,
    account: Option<AccountAddress>,
    loading_error: Option<String>,
    /// Generation of the most recent snapshot request
    fetch_generation: u64,
}

impl SyncState {
    /// Create an empty state buffering at most `max_buffered_updates` early
    /// deltas
    pub fn new(max_buffered_updates: usize) -> Self {
        Self {
            store: OrderBookStore::new(max_buffered_updates),
            router: EventRouter::new(),
            notifier: OrderLifecycleNotifier::new(),
            subscriptions: SubscriptionManager::new(),
            account: None,
            loading_error: None,
            fetch_generation: 0,
        }
    }

    /// Apply one input and return the resulting effects
    pub fn apply(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::ContextChanged { market_id, account } => self.on_context(market_id, account),
            Input::SnapshotLoaded { snapshot, generation } => self.on_snapshot(snapshot, generation),
            Input::SnapshotFailed {
                market_id,
                generation,
                error,
            } => self.on_snapshot_failed(market_id, generation, error),
            Input::Message(text) => self.on_message(&text),
            Input::Reconnected => self.on_reconnected(),
            Input::Teardown => self.on_teardown(),
        }
    }

    fn on_context(
        &mut self,
        market_id: Option<MarketId>,
        account: Option<AccountAddress>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let diff = self.subscriptions.set_context(market_id, account.as_ref());

        if market_id != self.store.market_id() {
            match market_id {
                Some(id) => {
                    self.store.begin_market(id);
                    effects.push(self.request_snapshot(id));
                }
                None => self.store.clear(),
            }
            self.router.set_scope(market_id);
            self.loading_error = None;
            effects.push(Effect::BookChanged);
        } else if self.loading_error.is_some() {
            // Same market again after a failed load: try once more
            if let Some(id) = market_id {
                self.loading_error = None;
                effects.push(self.request_snapshot(id));
            }
        }

        if diff.drops_account_channel() {
            debug!(records = self.notifier.len(), "Account channel torn down, clearing notification record");
            self.notifier.clear();
        }

        self.account = account;
        effects.extend(diff.commands().into_iter().map(Effect::Send));
        effects
    }

    fn request_snapshot(&mut self, market_id: MarketId) -> Effect {
        self.fetch_generation += 1;
        Effect::FetchSnapshot {
            market_id,
            generation: self.fetch_generation,
        }
    }

    fn on_snapshot(&mut self, snapshot: OrderBookSnapshot, generation: u64) -> Vec<Effect> {
        if generation != self.fetch_generation {
            debug!(
                market_id = snapshot.market_id,
                generation,
                current = self.fetch_generation,
                "Discarding superseded snapshot"
            );
            return Vec::new();
        }
        if self.store.market_id() != Some(snapshot.market_id) {
            debug!(
                market_id = snapshot.market_id,
                current = ?self.store.market_id(),
                "Discarding snapshot for abandoned market"
            );
            return Vec::new();
        }

        self.store.load_snapshot(snapshot);
        self.loading_error = None;
        vec![Effect::BookChanged]
    }

    fn on_snapshot_failed(
        &mut self,
        market_id: MarketId,
        generation: u64,
        error: String,
    ) -> Vec<Effect> {
        if generation != self.fetch_generation || self.store.market_id() != Some(market_id) {
            debug!(market_id, generation, "Ignoring failure of superseded snapshot fetch");
            return Vec::new();
        }

        warn!(market_id, %error, "Orderbook snapshot failed");
        self.loading_error = Some(error.clone());
        vec![Effect::LoadingFailed {
            market_id,
            message: error,
        }]
    }

    fn on_message(&mut self, text: &str) -> Vec<Effect> {
        let event = match self.router.parse(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping stream message");
                return Vec::new();
            }
        };

        match event {
            Event::PriceLevel(update) => {
                let outcome = self.store.apply_update(&update);
                Self::book_effects(&update, outcome)
            }
            Event::ScopedPriceLevel(update) => {
                let outcome = self.store.apply_scoped_update(&update);
                Self::book_effects(&update, outcome)
            }
            Event::Order(order) => self.notify(&order),
            Event::Fill(fill) => match fill.order_event() {
                Some(order) => self.notify(&order),
                None => Vec::new(),
            },
        }
    }

    fn book_effects(
        update: &PriceLevelUpdate,
        outcome: Result<UpdateOutcome, Error>,
    ) -> Vec<Effect> {
        match outcome {
            Ok(UpdateOutcome::Applied) => vec![Effect::BookChanged],
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(error = %e, market_id = update.market_id, "Rejected price level update");
                Vec::new()
            }
        }
    }

    fn notify(&mut self, order: &OrderEvent) -> Vec<Effect> {
        if self.account.is_none() {
            debug!(order_id = %order.market_order_id, "Order event with no account connected");
            return Vec::new();
        }
        if let (Some(event_market), Some(current)) = (order.market_id, self.store.market_id()) {
            if event_market != current {
                debug!(order_id = %order.market_order_id, market_id = event_market, "Order event for stale market");
                return Vec::new();
            }
        }

        self.notifier
            .handle(order)
            .map(Effect::Notify)
            .into_iter()
            .collect()
    }

    fn on_reconnected(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self
            .subscriptions
            .replay()
            .into_iter()
            .map(Effect::Send)
            .collect();

        // Deltas were missed while disconnected
        if let Some(market_id) = self.store.resync() {
            effects.push(self.request_snapshot(market_id));
        }
        effects
    }

    fn on_teardown(&mut self) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self
            .subscriptions
            .teardown()
            .into_iter()
            .map(Effect::Send)
            .collect();

        self.store.clear();
        self.router.set_scope(None);
        self.notifier.clear();
        self.account = None;
        self.loading_error = None;
        effects.push(Effect::BookChanged);
        effects
    }

    /// The order book store
    pub fn store(&self) -> &OrderBookStore {
        &self.store
    }

    /// The subscription manager
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// The notification record
    pub fn notifier(&self) -> &OrderLifecycleNotifier {
        &self.notifier
    }

    /// Connected account, if any
    pub fn account(&self) -> Option<&AccountAddress> {
        self.account.as_ref()
    }

    /// Why the current market's snapshot could not be loaded, if it failed
    pub fn loading_error(&self) -> Option<&str> {
        self.loading_error.as_deref()
    }

    /// Whether the book is waiting for a snapshot
    pub fn is_loading(&self) -> bool {
        self.store.state() == OrderbookState::WaitingForSnapshot
    }
}
