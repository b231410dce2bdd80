//! Hardware device trait definitions.
//!
//! These traits establish the contract between the card transaction engine
//! and the reader's peripherals: the NFC front-end, the status LED, the
//! push-button and the status indicators. They allow the engine to run
//! unchanged against mock or real hardware.
//!
//! The card reader uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT). LED, button and indicators are level-style GPIO/display
//! operations and stay synchronous.

#![allow(async_fn_in_trait)]

use attraccess_core::CardUid;
use bytes::Bytes;

use crate::error::Result;
use crate::types::ReaderInfo;

/// NFC card reader abstraction.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrapper in
/// [`crate::devices::AnyCardReader`] when the concrete reader is chosen at
/// runtime.
///
/// # Examples
///
/// ```no_run
/// use attraccess_hardware::traits::CardReader;
/// use attraccess_hardware::Result;
///
/// async fn wait_for_uid<R: CardReader>(reader: &mut R) -> Result<String> {
///     loop {
///         if let Some(uid) = reader.detect_card().await? {
///             return Ok(uid.to_hex());
///         }
///     }
/// }
/// ```
pub trait CardReader: Send {
    /// Bring the reader up and report what it is.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader does not answer or cannot be
    /// configured.
    async fn init(&mut self) -> Result<ReaderInfo>;

    /// Look for a card in the field without waiting for one.
    ///
    /// Returns `Ok(None)` when no card is present.
    async fn detect_card(&mut self) -> Result<Option<CardUid>>;

    /// Exchange one APDU with the selected card and return its reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the card left the field or the reader rejected
    /// the exchange.
    async fn transceive(&mut self, apdu: &[u8]) -> Result<Bytes>;
}

/// Single-color status LED.
pub trait StatusLed: Send {
    /// Switch the LED on or off.
    fn set(&mut self, on: bool) -> Result<()>;

    /// Last state written.
    fn is_on(&self) -> bool;
}

/// Momentary push-button sampled once per tick.
///
/// Implementations report the current level; edge detection is left to
/// the caller.
pub trait Button: Send {
    fn is_pressed(&mut self) -> bool;
}

/// Sink for published status values (binary sensor, text sensor, display).
pub trait Indicator<T: ?Sized>: Send {
    fn publish(&mut self, value: &T);
}

/// Closures can be used directly as indicators.
impl<T: ?Sized, F> Indicator<T> for F
where
    F: FnMut(&T) + Send,
{
    fn publish(&mut self, value: &T) {
        self(value)
    }
}
