//! Error types for the orderbook-sync crate.
//!
//! This module defines the errors that can occur while fetching snapshots,
//! talking to the stream server, and applying data to the local book.
//! Stream payloads that cannot be understood are reported as [`ParseError`];
//! those are logged and dropped, never fatal.

use std::fmt;

use thiserror::Error as ThisError;

use crate::types::{Price, Size};

/// The main error type for this crate
#[derive(Debug)]
pub enum Error {
    /// HTTP request failed
    Http(reqwest::Error),

    /// WebSocket error
    WebSocket(tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    Json(serde_json::Error),

    /// Invalid configuration (bad URL, missing fields)
    Config(String),

    /// API returned an error response
    Api(ApiError),

    /// Rate limit exceeded
    RateLimited {
        /// Retry after this many milliseconds
        retry_after_ms: Option<u64>,
    },

    /// Stream connection closed, either by `close()` or after reconnect
    /// attempts ran out
    ConnectionClosed,

    /// Price level rejected before touching the book
    InvalidLevel {
        /// Offending price
        price: Price,
        /// Offending size
        size: Size,
    },

    /// Operation timed out
    Timeout,
}

/// Error returned by the REST API
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code
    pub status: u16,
    /// Error code from API (if provided)
    pub code: Option<String>,
    /// Error message
    pub message: String,
}

/// A stream message that could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ParseError {
    /// Not valid JSON, or not the `{event, channel, data}` envelope
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Envelope `event` other than `"update"`
    #[error("unrecognized event: {0}")]
    UnknownEvent(String),

    /// Channel this client does not subscribe to
    #[error("unrecognized channel: {0}")]
    UnknownChannel(String),

    /// Payload does not match the channel's schema
    #[error("invalid {channel} payload: {reason}")]
    InvalidData {
        /// Channel the payload arrived on
        channel: String,
        /// Deserialization failure
        reason: String,
    },

    /// A price-level delta arrived with no market tag and no scoped market
    #[error("price level update with no market in scope")]
    MissingMarketScope,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Api(e) => write!(f, "API error ({}): {}", e.status, e.message),
            Error::RateLimited { retry_after_ms } => {
                if let Some(ms) = retry_after_ms {
                    write!(f, "Rate limited, retry after {}ms", ms)
                } else {
                    write!(f, "Rate limited")
                }
            }
            Error::ConnectionClosed => write!(f, "Stream connection closed"),
            Error::InvalidLevel { price, size } => {
                write!(f, "Invalid price level: price {}, size {}", price, size)
            }
            Error::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl Error {
    /// Whether retrying the same operation may succeed.
    ///
    /// Transport failures, timeouts, rate limiting and server-side (5xx)
    /// errors are retryable; client errors and bad data are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => !e.is_builder() && !e.is_decode(),
            Error::WebSocket(_) | Error::Timeout | Error::RateLimited { .. } => true,
            Error::Api(e) => e.is_server_error(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(err)
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

impl ApiError {
    /// Create a new API error
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Create an API error with an error code
    pub fn with_code(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}
