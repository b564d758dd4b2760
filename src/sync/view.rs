//! The per-view event loop.
//!
//! [`MarketView`] is the handle a UI holds for one market page. It owns a
//! background task that serializes every input through [`SyncState`] and
//! carries out the resulting effects: stream sends, snapshot fetches,
//! publishing the book, and delivering notifications.
//!
//! # Example
//!
//! ```rust,no_run
//! use orderbook_sync::{Config, MarketView};
//!
//! # async fn example() -> orderbook_sync::Result<()> {
//! let config = Config::new("https://api.example.com", "wss://api.example.com/ws");
//! let (view, mut notifications) = MarketView::create(config)?;
//!
//! view.set_context(Some(1), Some("0xabc".to_string()))?;
//!
//! if let Some(note) = notifications.recv().await {
//!     println!("{}", note.message);
//! }
//! println!("best bid: {:?}", view.book().bids.first());
//!
//! view.teardown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::client::rest::SnapshotLoader;
use crate::client::websocket::{ConnectionState, StreamConnection, StreamEvent};
use crate::config::Config;
use crate::error::Error;
use crate::notifier::Notification;
use crate::orderbook::OrderbookState;
use crate::types::market::OrderBookSnapshot;
use crate::types::{AccountAddress, MarketId};

use super::state::{Effect, Input, SyncState};

/// Observable status of a view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewStatus {
    /// Stream connection state
    pub connection: ConnectionState,
    /// Market being viewed
    pub market_id: Option<MarketId>,
    /// Whether the book is loaded, loading or absent
    pub book_state: OrderbookState,
    /// Why the snapshot for the current market failed to load
    pub loading_error: Option<String>,
}

impl ViewStatus {
    fn initial() -> Self {
        Self {
            connection: ConnectionState::Idle,
            market_id: None,
            book_state: OrderbookState::Empty,
            loading_error: None,
        }
    }
}

#[derive(Debug)]
struct Shared {
    book: RwLock<OrderBookSnapshot>,
    status: RwLock<ViewStatus>,
}

#[derive(Debug)]
enum Command {
    SetContext {
        market_id: Option<MarketId>,
        account: Option<AccountAddress>,
    },
    Teardown,
}

type FetchResult = (MarketId, u64, Result<OrderBookSnapshot, Error>);

/// Frames handled per wakeup before the book is published
const MAX_BATCH: usize = 256;

/// Handle to one live market view
///
/// Reads (`book`, `status`) never wait on the background task. Dropping the
/// handle without [`teardown`](Self::teardown) aborts the task, which
/// releases the stream transport.
#[derive(Debug)]
pub struct MarketView {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl MarketView {
    /// Validate `config`, spawn the view task and return the handle plus the
    /// notification receiver
    ///
    /// Must be called from within a Tokio runtime. The stream connects in
    /// the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid settings, or an HTTP error if
    /// the client cannot be built.
    pub fn create(config: Config) -> Result<(Self, mpsc::Receiver<Notification>), Error> {
        config.validate()?;

        let loader = SnapshotLoader::new(&config)?;
        let conn = StreamConnection::new(config.websocket_url(), &config);
        let (notify_tx, notify_rx) = mpsc::channel(config.notification_capacity());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            book: RwLock::new(OrderBookSnapshot::default()),
            status: RwLock::new(ViewStatus::initial()),
        });

        let worker = Worker {
            state: SyncState::new(config.max_buffered_updates()),
            conn,
            loader,
            fetches: JoinSet::new(),
            shared: Arc::clone(&shared),
            notifications: notify_tx,
            book_dirty: false,
        };
        let task = tokio::spawn(worker.run(command_rx));

        Ok((
            Self {
                commands: command_tx,
                shared,
                task: Some(task),
            },
            notify_rx,
        ))
    }

    /// Change the viewed market and/or connected account
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the view task has stopped.
    pub fn set_context(
        &self,
        market_id: Option<MarketId>,
        account: Option<AccountAddress>,
    ) -> Result<(), Error> {
        self.commands
            .send(Command::SetContext { market_id, account })
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Latest published book
    pub fn book(&self) -> OrderBookSnapshot {
        self.shared.book.read().clone()
    }

    /// Latest published status
    pub fn status(&self) -> ViewStatus {
        self.shared.status.read().clone()
    }

    /// Unsubscribe, close the stream and wait for the task to finish
    pub async fn teardown(mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if self.commands.send(Command::Teardown).is_err() {
            debug!("View task already stopped");
        }
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                error!(error = %e, "View task failed");
            }
        }
    }
}

impl Drop for MarketView {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Market view dropped without teardown, aborting task");
            task.abort();
        }
    }
}

struct Worker {
    state: SyncState,
    conn: StreamConnection,
    loader: SnapshotLoader,
    fetches: JoinSet<FetchResult>,
    shared: Arc<Shared>,
    notifications: mpsc::Sender<Notification>,
    /// The store changed since the book was last published
    book_dirty: bool,
}

impl Worker {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let stream_open = self.conn.state() != ConnectionState::Closed;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::SetContext { market_id, account }) => {
                        self.dispatch(Input::ContextChanged { market_id, account }).await;
                    }
                    Some(Command::Teardown) | None => {
                        self.shutdown().await;
                        break;
                    }
                },
                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => match joined {
                    Ok((_, generation, Ok(snapshot))) => {
                        self.dispatch(Input::SnapshotLoaded { snapshot, generation }).await;
                    }
                    Ok((market_id, generation, Err(e))) => {
                        let error = e.to_string();
                        self.dispatch(Input::SnapshotFailed { market_id, generation, error }).await;
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!(error = %e, "Snapshot task failed"),
                },
                event = self.conn.next(), if stream_open => {
                    self.on_stream(event).await;
                    self.drain_ready().await;
                }
            }

            self.publish();
        }
    }

    async fn on_stream(&mut self, event: Option<Result<StreamEvent, Error>>) {
        match event {
            Some(Ok(StreamEvent::Message(text))) => self.dispatch(Input::Message(text)).await,
            Some(Ok(StreamEvent::Ready { reconnected: true })) => {
                self.dispatch(Input::Reconnected).await;
            }
            Some(Ok(StreamEvent::Ready { reconnected: false })) => {}
            Some(Ok(StreamEvent::Disconnected)) => warn!("Stream disconnected, reconnecting"),
            Some(Err(e)) => error!(error = %e, "Stream connection lost for good"),
            None => {}
        }
    }

    /// Handle frames that are already buffered without waiting for more
    async fn drain_ready(&mut self) {
        for _ in 1..MAX_BATCH {
            if !self.conn.is_ready() {
                return;
            }
            match self.conn.next().now_or_never() {
                Some(event) => self.on_stream(event).await,
                None => return,
            }
        }
    }

    async fn dispatch(&mut self, input: Input) {
        for effect in self.state.apply(input) {
            self.execute(effect).await;
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Send(command) => {
                if let Err(e) = self.conn.send(command).await {
                    debug!(error = %e, "Command not sent");
                }
            }
            Effect::FetchSnapshot {
                market_id,
                generation,
            } => {
                // Superseded results would be discarded anyway
                self.fetches.abort_all();
                let loader = self.loader.clone();
                self.fetches.spawn(async move {
                    (market_id, generation, loader.fetch(market_id).await)
                });
            }
            Effect::BookChanged => self.book_dirty = true,
            Effect::Notify(note) => match self.notifications.try_send(note) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(note)) => {
                    warn!(order_id = %note.market_order_id, "Notification channel full, dropping");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Notification receiver gone");
                }
            },
            Effect::LoadingFailed { market_id, message } => {
                debug!(market_id, %message, "Orderbook unavailable");
            }
        }
    }

    async fn shutdown(&mut self) {
        self.dispatch(Input::Teardown).await;
        self.fetches.abort_all();
        self.conn.close().await;
        self.publish();
    }

    /// Copy the book out if it changed, then the status
    fn publish(&mut self) {
        if std::mem::take(&mut self.book_dirty) {
            *self.shared.book.write() = self.state.store().snapshot();
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let store = self.state.store();
        let status = ViewStatus {
            connection: self.conn.state(),
            market_id: store.market_id(),
            book_state: store.state(),
            loading_error: self.state.loading_error().map(str::to_string),
        };

        let mut current = self.shared.status.write();
        if *current != status {
            *current = status;
        }
    }
}
