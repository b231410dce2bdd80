//! HTTP status line handling for the event stream response.

use std::fmt;

/// Why the server refused the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFailure {
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError(u16),
    Other(u16),
    /// First line is not an HTTP status line.
    Malformed,
}

impl fmt::Display for HeaderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "authentication failed (401), check username and password"),
            Self::Forbidden => write!(f, "access forbidden (403), check resource permissions"),
            Self::NotFound => write!(f, "resource not found (404), check resource id"),
            Self::ServerError(code) => write!(f, "server error ({code})"),
            Self::Other(code) => write!(f, "unexpected status ({code})"),
            Self::Malformed => write!(f, "malformed status line"),
        }
    }
}

/// Status code of a line like `HTTP/1.1 200 OK`.
pub fn parse_status_line(line: &str) -> Result<u16, HeaderFailure> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => {
            code.parse().map_err(|_| HeaderFailure::Malformed)
        }
        _ => Err(HeaderFailure::Malformed),
    }
}

/// Accept 2xx, classify everything else.
pub fn check_status(code: u16) -> Result<u16, HeaderFailure> {
    match code {
        200..=299 => Ok(code),
        401 => Err(HeaderFailure::Unauthorized),
        403 => Err(HeaderFailure::Forbidden),
        404 => Err(HeaderFailure::NotFound),
        500..=599 => Err(HeaderFailure::ServerError(code)),
        _ => Err(HeaderFailure::Other(code)),
    }
}

/// Whether a header line declares an event-stream content type.
pub fn is_event_stream_content_type(line: &str) -> bool {
    line.split_once(':').is_some_and(|(name, value)| {
        name.trim().eq_ignore_ascii_case("content-type")
            && value.to_ascii_lowercase().contains("text/event-stream")
    })
}
