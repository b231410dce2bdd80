//! Shared constants for the Attraccess reader gateway.
//!
//! Timing values are expressed in milliseconds and converted to
//! [`std::time::Duration`] at the point of use.
//!
//! # Usage
//!
//! ```
//! use attraccess_core::constants::*;
//! use std::time::Duration;
//!
//! let card_timeout = Duration::from_millis(DEFAULT_CARD_TIMEOUT_MS);
//! assert_eq!(card_timeout.as_secs(), 30);
//! ```

// ============================================================================
// Card Transaction Timing
// ============================================================================

/// Default time a card may stay in a transaction before the engine gives up.
///
/// Applies to the `CardDetected` and `ExecutingCommand` states.
pub const DEFAULT_CARD_TIMEOUT_MS: u64 = 30_000;

/// Maximum time the request channel waits for a reply to an outbound packet.
pub const API_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Default interval between engine/stream ticks.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Number of state transitions kept for diagnostics.
pub const MAX_TRANSITION_HISTORY: usize = 100;

// ============================================================================
// Resource Status Stream
// ============================================================================

/// Default minimum spacing between stream connection attempts.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Time allowed for the stream server to answer with a complete header block.
pub const STREAM_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// Inactivity window after which a streaming connection is considered dead.
///
/// The server is expected to send a keepalive event well within this window.
pub const STREAM_KEEPALIVE_TIMEOUT_MS: u64 = 45_000;

/// Upper bound on bytes consumed from the stream socket in one tick.
pub const MAX_STREAM_BYTES_PER_TICK: usize = 512;

/// Data payload the server sends to keep an idle stream alive.
pub const KEEPALIVE_PAYLOAD: &str = r#"{"keepalive":true}"#;

/// Text published to the status indicator when the resource is occupied.
pub const STATUS_TEXT_IN_USE: &str = "In Use";

/// Text published to the status indicator when the resource is free.
pub const STATUS_TEXT_AVAILABLE: &str = "Available";

// ============================================================================
// LED Feedback
// ============================================================================

/// Blink count after a successful authorization.
pub const SUCCESS_BLINK_COUNT: u8 = 3;

/// On/off duration of each success blink.
pub const SUCCESS_BLINK_MS: u64 = 100;

/// Blink count after a denial or error.
pub const ERROR_BLINK_COUNT: u8 = 5;

/// On/off duration of each error blink.
pub const ERROR_BLINK_MS: u64 = 50;

/// Blink count when a button event could not be delivered.
pub const SEND_FAILURE_BLINK_COUNT: u8 = 2;

/// On/off duration of each send-failure blink.
pub const SEND_FAILURE_BLINK_MS: u64 = 100;

// ============================================================================
// Card UIDs
// ============================================================================

/// Minimum UID length in bytes (single size ISO 14443A).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (triple size ISO 14443A).
pub const MAX_UID_LENGTH: usize = 10;
