//! Hardware abstraction layer for the Attraccess NFC reader.
//!
//! This crate provides trait-based abstractions for the reader's
//! peripherals and their implementations:
//!
//! - [`CardReader`]: NFC front-end (card detection and APDU exchange)
//! - [`StatusLed`]: single status LED
//! - [`Button`]: momentary push-button
//! - [`Indicator`]: sink for published status values
//!
//! Mock implementations in [`mock`] are controlled through handles and are
//! used throughout the test suites. [`pn532`] drives a real PN532 over any
//! byte bus, with a serial port implementation behind the `serial` feature.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`][error::Result] with a
//! [`HardwareError`] describing disconnections, timeouts and malformed
//! device frames.
//!
//! [`CardReader`]: traits::CardReader
//! [`StatusLed`]: traits::StatusLed
//! [`Button`]: traits::Button
//! [`Indicator`]: traits::Indicator

pub mod devices;
pub mod error;
pub mod mock;
pub mod pn532;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::AnyCardReader;
pub use error::{HardwareError, Result};
pub use traits::{Button, CardReader, Indicator, StatusLed};
pub use types::ReaderInfo;
