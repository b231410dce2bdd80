//! Enum wrappers for hardware device dispatch.
//!
//! Native `async fn` in traits (RPITIT) are not object-safe, so a reader
//! chosen at runtime cannot be a `Box<dyn CardReader>`. [`AnyCardReader`]
//! gives concrete dispatch instead.
//!
//! # Examples
//!
//! ```
//! use attraccess_hardware::devices::AnyCardReader;
//! use attraccess_hardware::mock::MockCardReader;
//! use attraccess_hardware::traits::CardReader;
//!
//! #[tokio::main]
//! async fn main() -> attraccess_hardware::Result<()> {
//!     let (reader, _handle) = MockCardReader::new();
//!     let mut reader = AnyCardReader::Mock(reader);
//!
//!     let info = reader.init().await?;
//!     println!("Reader: {info}");
//!     Ok(())
//! }
//! ```

use attraccess_core::CardUid;
use bytes::Bytes;

use crate::mock::MockCardReader;
#[cfg(feature = "serial")]
use crate::pn532::{Pn532, SerialBus};
use crate::traits::CardReader;
use crate::{ReaderInfo, Result};

/// Enum wrapper for card reader dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCardReader {
    /// Mock reader for development and testing.
    Mock(MockCardReader),

    /// PN532 on a serial port.
    #[cfg(feature = "serial")]
    Pn532Serial(Pn532<SerialBus>),
}

impl CardReader for AnyCardReader {
    async fn init(&mut self) -> Result<ReaderInfo> {
        match self {
            Self::Mock(device) => device.init().await,
            #[cfg(feature = "serial")]
            Self::Pn532Serial(device) => device.init().await,
        }
    }

    async fn detect_card(&mut self) -> Result<Option<CardUid>> {
        match self {
            Self::Mock(device) => device.detect_card().await,
            #[cfg(feature = "serial")]
            Self::Pn532Serial(device) => device.detect_card().await,
        }
    }

    async fn transceive(&mut self, apdu: &[u8]) -> Result<Bytes> {
        match self {
            Self::Mock(device) => device.transceive(apdu).await,
            #[cfg(feature = "serial")]
            Self::Pn532Serial(device) => device.transceive(apdu).await,
        }
    }
}
