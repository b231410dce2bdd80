//! Errors raised by the HTTP request channel and the event stream.

use attraccess_protocol::ProtocolError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while talking to the Attraccess API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No API endpoint configured")]
    NoEndpoint,

    #[error("Network is not connected")]
    NetworkUnavailable,

    #[error("A request is already awaiting its response")]
    RequestInFlight,

    /// Server answered with a status other than 200.
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Request timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Client-level HTTP failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Packet error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout { duration_ms: 0 };
        }
        match err.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Http(err.to_string()),
        }
    }
}
