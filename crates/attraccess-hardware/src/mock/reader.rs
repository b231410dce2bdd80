//! Mock NFC card reader.
//!
//! Cards are presented through the handle and picked up by the next
//! `detect_card` call. Transceive replies are scripted in order; every
//! APDU the engine sends is recorded.

use attraccess_core::CardUid;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::lock;
use crate::error::{HardwareError, Result};
use crate::traits::CardReader;
use crate::types::ReaderInfo;

/// Mock card reader for testing and development.
///
/// # Examples
///
/// ```
/// use attraccess_hardware::mock::MockCardReader;
/// use attraccess_hardware::traits::CardReader;
/// use attraccess_core::CardUid;
///
/// #[tokio::main]
/// async fn main() -> attraccess_hardware::Result<()> {
///     let (mut reader, handle) = MockCardReader::new();
///
///     assert!(reader.detect_card().await?.is_none());
///
///     handle.present_card(CardUid::new(vec![0x04, 0xAB, 0xCD, 0xEF]).unwrap());
///     let uid = reader.detect_card().await?.unwrap();
///     assert_eq!(uid.to_hex(), "04ABCDEF");
///
///     handle.push_response(vec![0x91, 0x00]);
///     let reply = reader.transceive(&[0x90, 0x60, 0x00, 0x00, 0x00]).await?;
///     assert_eq!(reply.as_ref(), &[0x91, 0x00]);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockCardReader {
    /// Channel receiver for presented cards
    card_rx: mpsc::UnboundedReceiver<CardUid>,

    /// State shared with the handle
    shared: Arc<Mutex<ReaderState>>,
}

#[derive(Debug, Default)]
struct ReaderState {
    responses: VecDeque<Result<Bytes>>,
    sent: Vec<Bytes>,
    detect_failure: Option<String>,
}

impl MockCardReader {
    /// Create a new mock reader.
    ///
    /// Returns a tuple of (MockCardReader, MockCardReaderHandle) where the
    /// handle is used to present cards and script replies.
    pub fn new() -> (Self, MockCardReaderHandle) {
        let (card_tx, card_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(ReaderState::default()));

        let reader = Self {
            card_rx,
            shared: Arc::clone(&shared),
        };
        let handle = MockCardReaderHandle { card_tx, shared };

        (reader, handle)
    }
}

impl CardReader for MockCardReader {
    async fn init(&mut self) -> Result<ReaderInfo> {
        Ok(ReaderInfo::new("Mock NFC Reader").with_firmware("mock"))
    }

    async fn detect_card(&mut self) -> Result<Option<CardUid>> {
        if let Some(message) = lock(&self.shared).detect_failure.take() {
            return Err(HardwareError::communication(message));
        }

        match self.card_rx.try_recv() {
            Ok(uid) => Ok(Some(uid)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(HardwareError::disconnected("mock card reader"))
            }
        }
    }

    async fn transceive(&mut self, apdu: &[u8]) -> Result<Bytes> {
        let mut state = lock(&self.shared);
        state.sent.push(Bytes::copy_from_slice(apdu));
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Err(HardwareError::card("no card response scripted")))
    }
}

/// Handle for controlling a mock card reader.
#[derive(Debug, Clone)]
pub struct MockCardReaderHandle {
    card_tx: mpsc::UnboundedSender<CardUid>,
    shared: Arc<Mutex<ReaderState>>,
}

impl MockCardReaderHandle {
    /// Place a card in the field. It is reported by the next detection.
    pub fn present_card(&self, uid: CardUid) {
        // The reader owning the receiver may already be gone in a test teardown.
        let _ = self.card_tx.send(uid);
    }

    /// Queue the card's reply to the next APDU.
    pub fn push_response(&self, response: impl Into<Bytes>) {
        lock(&self.shared).responses.push_back(Ok(response.into()));
    }

    /// Make the next APDU fail.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.shared)
            .responses
            .push_back(Err(HardwareError::card(message)));
    }

    /// Make the next detection fail.
    pub fn fail_next_detect(&self, message: impl Into<String>) {
        lock(&self.shared).detect_failure = Some(message.into());
    }

    /// APDUs received so far, oldest first.
    pub fn sent_apdus(&self) -> Vec<Bytes> {
        lock(&self.shared).sent.clone()
    }
}
