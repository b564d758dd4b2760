//! Stream connection for live order book and order updates.
//!
//! [`StreamConnection`] owns one WebSocket transport and its lifecycle:
//!
//! - commands sent before the connection is ready are queued and flushed in
//!   call order once it is
//! - after an unexpected close it reconnects with exponential backoff and
//!   jitter, then reports [`StreamEvent::Ready`] with `reconnected: true`
//! - it never remembers subscriptions; the owner replays them on reconnect
//!
//! # Example
//!
//! ```rust,no_run
//! use orderbook_sync::client::websocket::{StreamConnection, StreamEvent};
//! use orderbook_sync::types::{Channel, WsCommand};
//! use orderbook_sync::Config;
//!
//! # async fn example() -> orderbook_sync::Result<()> {
//! let config = Config::new("https://api.example.com", "wss://api.example.com/ws");
//! let mut conn = StreamConnection::new(config.websocket_url(), &config);
//!
//! conn.send(WsCommand::subscribe(Channel::PriceLevels, 1, None)).await?;
//! conn.open().await?;
//!
//! while let Some(event) = conn.next().await {
//!     match event? {
//!         StreamEvent::Message(text) => println!("{}", text),
//!         StreamEvent::Disconnected => println!("connection lost"),
//!         StreamEvent::Ready { reconnected } => println!("ready (reconnected: {})", reconnected),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::client::backoff::BackoffConfig;
use crate::config::Config;
use crate::error::Error;
use crate::types::messages::WsCommand;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handshake with its retries, owned by the connection so that dropping a
/// `next()` call does not abandon it
type Connecting = Pin<Box<dyn Future<Output = Result<WsStream, Error>> + Send>>;

/// Lifecycle state of a [`StreamConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, no I/O yet
    Idle,
    /// Handshake in progress
    Connecting,
    /// Open and flushing commands immediately
    Ready,
    /// Lost unexpectedly; will reconnect on the next `next()`
    Disconnected,
    /// Closed by the owner or out of reconnect attempts
    Closed,
}

/// Something the owner of a [`StreamConnection`] needs to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text frame from the server
    Message(String),
    /// The transport was lost; a reconnect follows
    Disconnected,
    /// The transport is (again) open
    Ready {
        /// `true` when this follows a disconnect, so subscriptions must be
        /// replayed
        reconnected: bool,
    },
}

/// One WebSocket connection with queued sends and backoff reconnects
///
/// [`next`](Self::next) is cancel-safe: it can be raced in `tokio::select!`
/// against other work. An interrupted handshake, backoff sleep or queue
/// flush resumes on the following call.
///
/// # Thread Safety
///
/// Not thread-safe. Drive it from a single task.
pub struct StreamConnection {
    url: String,
    connect_timeout: Duration,
    reconnect: BackoffConfig,
    state: ConnectionState,
    write: Option<SplitSink<WsStream, Message>>,
    read: Option<SplitStream<WsStream>>,
    queue: VecDeque<WsCommand>,
    connecting: Option<Connecting>,
    ever_connected: bool,
    disconnect_pending: bool,
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("url", &self.url)
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("connecting", &self.connecting.is_some())
            .finish()
    }
}

impl StreamConnection {
    /// Create an idle connection; no I/O happens until [`open`](Self::open)
    /// or [`next`](Self::next)
    pub fn new(url: impl Into<String>, config: &Config) -> Self {
        Self {
            url: url.into(),
            connect_timeout: config.connect_timeout(),
            reconnect: config.reconnect().clone(),
            state: ConnectionState::Idle,
            write: None,
            read: None,
            queue: VecDeque::new(),
            connecting: None,
            ever_connected: false,
            disconnect_pending: false,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if commands go straight to the wire
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Number of commands waiting for the connection to become ready
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Establish the transport and flush queued commands
    ///
    /// Retries with backoff per the reconnect policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection was closed, or
    /// the last connect error once retries run out (the connection is then
    /// closed).
    pub async fn open(&mut self) -> Result<(), Error> {
        loop {
            match self.state {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Closed => return Err(Error::ConnectionClosed),
                ConnectionState::Idle => self.state = ConnectionState::Connecting,
                ConnectionState::Connecting | ConnectionState::Disconnected => {
                    self.establish().await?;
                }
            }
        }
    }

    /// Send a command
    ///
    /// Queued until the first connection is ready. Discarded while
    /// disconnected after that, since the owner replays its subscriptions
    /// after the reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after [`close`](Self::close).
    pub async fn send(&mut self, command: WsCommand) -> Result<(), Error> {
        match self.state {
            ConnectionState::Closed => Err(Error::ConnectionClosed),
            ConnectionState::Disconnected if self.ever_connected => {
                debug!(?command, "Discarding command while disconnected");
                Ok(())
            }
            ConnectionState::Idle | ConnectionState::Connecting | ConnectionState::Disconnected => {
                trace!(?command, "Queueing command until connected");
                self.queue.push_back(command);
                Ok(())
            }
            ConnectionState::Ready => {
                if let Err(e) = self.transmit(&command).await {
                    warn!(error = %e, "Send failed, connection lost");
                    self.mark_disconnected();
                }
                Ok(())
            }
        }
    }

    /// Receive the next event
    ///
    /// Drives the handshake when not yet connected and the backoff reconnect
    /// after a disconnect. Pings are answered automatically. Cancel-safe.
    ///
    /// # Returns
    ///
    /// The next event, an error once reconnect attempts run out (the
    /// connection is then closed), or `None` once closed.
    pub async fn next(&mut self) -> Option<Result<StreamEvent, Error>> {
        loop {
            match self.state {
                ConnectionState::Closed => return None,
                ConnectionState::Idle => self.state = ConnectionState::Connecting,
                ConnectionState::Disconnected if self.disconnect_pending => {
                    self.disconnect_pending = false;
                    return Some(Ok(StreamEvent::Disconnected));
                }
                ConnectionState::Connecting | ConnectionState::Disconnected => {
                    let reconnected = self.ever_connected;
                    match self.establish().await {
                        Ok(()) if self.is_ready() => {
                            return Some(Ok(StreamEvent::Ready { reconnected }));
                        }
                        Ok(()) => continue,
                        Err(e) => return Some(Err(e)),
                    }
                }
                ConnectionState::Ready => {
                    let Some(read) = self.read.as_mut() else {
                        self.mark_disconnected();
                        continue;
                    };

                    let frame = read.next().await;
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            return Some(Ok(StreamEvent::Message(text)));
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Some(write) = self.write.as_mut() {
                                if let Err(e) = write.send(Message::Pong(data)).await {
                                    warn!(error = %e, "Failed to answer ping");
                                    self.mark_disconnected();
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "Stream closed by server");
                            self.mark_disconnected();
                        }
                        Some(Ok(_)) => {
                            // Binary, Pong, Frame
                            continue;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Stream read failed");
                            self.mark_disconnected();
                        }
                        None => {
                            info!("Stream ended");
                            self.mark_disconnected();
                        }
                    }
                }
            }
        }
    }

    /// Close the connection
    ///
    /// Idempotent. Sends a close frame when the transport is still up and
    /// abandons any handshake in progress.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        self.queue.clear();
        self.connecting = None;
        self.read = None;

        if let Some(mut write) = self.write.take() {
            if let Err(e) = write.close().await {
                debug!(error = %e, "Close frame not delivered");
            }
        }
        info!(url = %self.url, "Stream connection closed");
    }

    async fn transmit(&mut self, command: &WsCommand) -> Result<(), Error> {
        let write = self.write.as_mut().ok_or(Error::ConnectionClosed)?;
        let json = serde_json::to_string(command)?;
        trace!(%json, "Sending command");
        write.send(Message::Text(json)).await?;
        Ok(())
    }

    /// Advance the handshake and the queue flush
    ///
    /// Leaves the connection ready, or disconnected when the flush failed.
    /// Every await point resumes from the stored handshake or the queue
    /// head, so this can be dropped and called again.
    async fn establish(&mut self) -> Result<(), Error> {
        if self.write.is_none() {
            let delay_first = self.state == ConnectionState::Disconnected;
            let (url, connect_timeout, policy) =
                (&self.url, self.connect_timeout, &self.reconnect);
            let connecting = self.connecting.get_or_insert_with(|| {
                Box::pin(connect_with_backoff(
                    url.clone(),
                    connect_timeout,
                    policy.clone(),
                    delay_first,
                ))
            });

            let result = connecting.await;
            self.connecting = None;
            match result {
                Ok(stream) => {
                    let (write, read) = stream.split();
                    self.write = Some(write);
                    self.read = Some(read);
                }
                Err(e) => {
                    self.state = ConnectionState::Closed;
                    self.queue.clear();
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.flush().await {
            warn!(error = %e, "Flushing queued commands failed");
            self.mark_disconnected();
            return Ok(());
        }

        info!(url = %self.url, reconnected = self.ever_connected, "Stream connected");
        self.state = ConnectionState::Ready;
        self.ever_connected = true;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Error> {
        let write = self.write.as_mut().ok_or(Error::ConnectionClosed)?;
        // Pop only once the sink holds the frame so an interrupted flush
        // loses nothing
        while let Some(command) = self.queue.front() {
            let json = serde_json::to_string(command)?;
            trace!(%json, "Sending queued command");
            write.feed(Message::Text(json)).await?;
            self.queue.pop_front();
        }
        write.flush().await?;
        Ok(())
    }

    fn mark_disconnected(&mut self) {
        self.write = None;
        self.read = None;
        self.state = ConnectionState::Disconnected;
        self.disconnect_pending = true;
    }
}

async fn connect_once(url: &str, connect_timeout: Duration) -> Result<WsStream, Error> {
    let (stream, _response) =
        tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(url)).await??;
    Ok(stream)
}

/// Connect with retries per `policy`, waiting one base delay first when
/// replacing a lost connection
async fn connect_with_backoff(
    url: String,
    connect_timeout: Duration,
    policy: BackoffConfig,
    delay_first: bool,
) -> Result<WsStream, Error> {
    if delay_first {
        tokio::time::sleep(policy.delay_with_jitter(0)).await;
    }

    let mut failures = 0;
    loop {
        match connect_once(&url, connect_timeout).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if !policy.should_retry(failures) {
                    warn!(error = %e, attempts = failures + 1, "Giving up on stream connection");
                    return Err(e);
                }

                let delay = policy.delay_with_jitter(failures);
                failures += 1;
                warn!(
                    error = %e,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    "Stream connect failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        if self.state != ConnectionState::Closed {
            debug!(url = %self.url, "Stream connection dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::messages::Channel;

    fn connection() -> StreamConnection {
        let config = Config::new("http://127.0.0.1:1", "ws://127.0.0.1:1");
        StreamConnection::new(config.websocket_url(), &config)
    }

    #[tokio::test]
    async fn test_new_connection_is_idle() {
        let conn = connection();
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert!(!conn.is_ready());
        assert_eq!(conn.queued(), 0);
    }

    #[tokio::test]
    async fn test_send_before_open_is_queued() {
        let mut conn = connection();
        conn.send(WsCommand::subscribe(Channel::PriceLevels, 1, None))
            .await
            .unwrap();
        conn.send(WsCommand::unsubscribe(Channel::PriceLevels, 1, None))
            .await
            .unwrap();
        assert_eq!(conn.queued(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut conn = connection();
        conn.send(WsCommand::subscribe(Channel::Orders, 1, Some("0xa".to_string())))
            .await
            .unwrap();

        conn.close().await;
        conn.close().await;

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.queued(), 0);
        assert!(matches!(
            conn.send(WsCommand::subscribe(Channel::Fills, 1, None)).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(conn.open().await, Err(Error::ConnectionClosed)));
        assert!(conn.next().await.is_none());
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let config = Config::new("http://127.0.0.1:1", "ws://127.0.0.1:1")
            .with_connect_timeout(Duration::from_millis(200))
            .with_reconnect(BackoffConfig::new().max_retries(1).initial_delay_ms(1).jitter(0.0));
        let mut conn = StreamConnection::new(config.websocket_url(), &config);

        assert!(conn.open().await.is_err());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }
}
