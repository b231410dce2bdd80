//! PN532 NFC controller support.

pub mod driver;
pub mod frame;
#[cfg(feature = "serial")]
pub mod serial;

pub use driver::{Pn532, Pn532Bus};
#[cfg(feature = "serial")]
pub use serial::SerialBus;
