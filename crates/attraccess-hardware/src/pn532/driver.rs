//! PN532 NFC front-end driver.
//!
//! The driver speaks normal information frames over any [`Pn532Bus`]. Every
//! command is acknowledged by the PN532 before its response frame follows.
//! Bus operations are blocking and bounded by short timeouts.

use attraccess_core::CardUid;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::frame::{
    self, FRAME_HEADER_LEN, MAX_PARAMS_LEN, body_len_from_header, command, encode_command,
};
use crate::error::{HardwareError, Result};
use crate::traits::CardReader;
use crate::types::ReaderInfo;

/// IC code reported by a genuine PN532.
const PN532_IC: u8 = 0x32;

/// Time allowed for the ACK frame.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(50);

/// Time allowed for a command's response frame.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Time allowed for a passive target scan to report.
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Byte link to a PN532 (UART, I2C or SPI adapter).
pub trait Pn532Bus: Send {
    /// Write all of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Fill `buf` completely or fail with [`HardwareError::Timeout`].
    fn read_exact(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Bring the chip out of power-down before the first command.
    fn wake(&mut self) -> Result<()> {
        Ok(())
    }
}

/// PN532 reader over a bus `B`.
#[derive(Debug)]
pub struct Pn532<B> {
    bus: B,
    /// Logical number of the currently selected target
    target: Option<u8>,
    ack_timeout: Duration,
    response_timeout: Duration,
    detect_timeout: Duration,
}

impl<B: Pn532Bus> Pn532<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            target: None,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_detect_timeout(mut self, timeout: Duration) -> Self {
        self.detect_timeout = timeout;
        self
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Send `cmd`, wait for the ACK, then return the response parameters.
    fn command(&mut self, cmd: u8, params: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let request = encode_command(cmd, params)?;
        trace!(cmd = format_args!("0x{cmd:02X}"), len = request.len(), "PN532 send");
        self.bus.write(&request)?;

        let mut ack = [0u8; frame::ACK_FRAME.len()];
        self.bus.read_exact(&mut ack, self.ack_timeout)?;
        if !frame::is_ack(&ack) {
            return Err(HardwareError::communication(format!(
                "PN532 did not acknowledge command 0x{cmd:02X}: {ack:02X?}"
            )));
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        self.bus.read_exact(&mut header, timeout)?;
        let rest = body_len_from_header(&header)?;

        let mut response = Vec::with_capacity(FRAME_HEADER_LEN + rest);
        response.extend_from_slice(&header);
        response.resize(FRAME_HEADER_LEN + rest, 0);
        self.bus
            .read_exact(&mut response[FRAME_HEADER_LEN..], timeout)?;
        trace!(cmd = format_args!("0x{cmd:02X}"), len = response.len(), "PN532 recv");

        frame::parse_response(&response, cmd).map(<[u8]>::to_vec)
    }

    fn firmware_version(&mut self) -> Result<(u8, u8, u8)> {
        let resp = self.command(command::GET_FIRMWARE_VERSION, &[], self.response_timeout)?;
        match resp.as_slice() {
            [ic, ver, rev, ..] => Ok((*ic, *ver, *rev)),
            _ => Err(HardwareError::invalid_data(
                "PN532 firmware response too short",
            )),
        }
    }
}

impl<B: Pn532Bus> CardReader for Pn532<B> {
    async fn init(&mut self) -> Result<ReaderInfo> {
        self.bus.wake()?;

        let (ic, ver, rev) = self
            .firmware_version()
            .map_err(|e| HardwareError::initialization_failed(format!("PN532 not found: {e}")))?;
        if ic != PN532_IC {
            warn!(ic = format_args!("0x{ic:02X}"), "Unexpected IC code, continuing");
        }
        info!("Found PN532 firmware {}.{}", ver, rev);

        // Normal mode, 1 s virtual card timeout, IRQ enabled.
        self.command(
            command::SAM_CONFIGURATION,
            &[0x01, 0x14, 0x01],
            self.response_timeout,
        )
        .map_err(|e| HardwareError::initialization_failed(format!("SAM configuration: {e}")))?;

        // Limit passive activation retries so a scan returns when the field is empty.
        self.command(
            command::RF_CONFIGURATION,
            &[0x05, 0xFF, 0x01, 0x01],
            self.response_timeout,
        )
        .map_err(|e| HardwareError::initialization_failed(format!("RF configuration: {e}")))?;

        Ok(ReaderInfo::new("PN532").with_firmware(format!("{ver}.{rev}")))
    }

    async fn detect_card(&mut self) -> Result<Option<CardUid>> {
        // One target, 106 kbps type A.
        let resp = match self.command(
            command::IN_LIST_PASSIVE_TARGET,
            &[0x01, 0x00],
            self.detect_timeout,
        ) {
            Ok(resp) => resp,
            Err(HardwareError::Timeout { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        // NbTg, Tg, SENS_RES(2), SEL_RES, NFCIDLength, NFCID..
        let Some((&found, rest)) = resp.split_first() else {
            return Err(HardwareError::invalid_data("Empty passive target response"));
        };
        if found == 0 {
            self.target = None;
            return Ok(None);
        }
        if rest.len() < 5 {
            return Err(HardwareError::invalid_data(format!(
                "Passive target response too short: {} bytes",
                resp.len()
            )));
        }

        let target = rest[0];
        let uid_len = rest[4] as usize;
        let uid = rest.get(5..5 + uid_len).ok_or_else(|| {
            HardwareError::invalid_data(format!("UID length {uid_len} exceeds response"))
        })?;
        let uid = CardUid::new(uid).map_err(|e| HardwareError::invalid_data(e.to_string()))?;

        debug!(tg = target, uid = %uid, "Card in field");
        self.target = Some(target);
        Ok(Some(uid))
    }

    async fn transceive(&mut self, apdu: &[u8]) -> Result<Bytes> {
        let target = self
            .target
            .ok_or_else(|| HardwareError::card("No card selected"))?;
        if apdu.len() + 1 > MAX_PARAMS_LEN {
            return Err(HardwareError::invalid_data(format!(
                "APDU too long: {} bytes",
                apdu.len()
            )));
        }

        let mut params = Vec::with_capacity(apdu.len() + 1);
        params.push(target);
        params.extend_from_slice(apdu);

        let resp = self.command(command::IN_DATA_EXCHANGE, &params, self.response_timeout)?;
        let Some((&status, data)) = resp.split_first() else {
            return Err(HardwareError::invalid_data("Empty data exchange response"));
        };
        if status & 0x3F != 0 {
            self.target = None;
            return Err(HardwareError::card(format!(
                "Data exchange failed with status 0x{status:02X}"
            )));
        }

        Ok(Bytes::copy_from_slice(data))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedBus;
    use super::*;

    fn reader_with_card(uid: &[u8]) -> Pn532<ScriptedBus> {
        let mut bus = ScriptedBus::default();
        let mut resp = vec![0x01, 0x01, 0x00, 0x44, 0x00, uid.len() as u8];
        resp.extend_from_slice(uid);
        bus.reply(command::IN_LIST_PASSIVE_TARGET, &resp);
        Pn532::new(bus)
    }

    #[tokio::test]
    async fn test_init_configures_reader() {
        let mut bus = ScriptedBus::default();
        bus.reply(command::GET_FIRMWARE_VERSION, &[0x32, 0x01, 0x06, 0x07]);
        bus.reply(command::SAM_CONFIGURATION, &[]);
        bus.reply(command::RF_CONFIGURATION, &[]);
        let mut reader = Pn532::new(bus);

        let info = reader.init().await.unwrap();

        assert_eq!(info.to_string(), "PN532 (firmware 1.6)");
        assert!(reader.bus().woken);
        assert_eq!(reader.bus().writes.len(), 3);
        assert_eq!(reader.bus().writes[1][6], command::SAM_CONFIGURATION);
    }

    #[tokio::test]
    async fn test_init_fails_without_answer() {
        let mut reader = Pn532::new(ScriptedBus::default());
        let err = reader.init().await.unwrap_err();
        assert!(matches!(err, HardwareError::InitializationFailed { .. }));
    }

    #[tokio::test]
    async fn test_detect_card_reads_uid() {
        let mut reader = reader_with_card(&[0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6]);

        let uid = reader.detect_card().await.unwrap().unwrap();

        assert_eq!(uid.to_hex(), "04A1B2C3D4E5F6");
        assert_eq!(
            reader.bus().writes[0],
            encode_command(command::IN_LIST_PASSIVE_TARGET, &[0x01, 0x00]).unwrap()
        );
    }

    #[tokio::test]
    async fn test_detect_no_card() {
        let mut bus = ScriptedBus::default();
        bus.reply(command::IN_LIST_PASSIVE_TARGET, &[0x00]);
        let mut reader = Pn532::new(bus);

        assert!(reader.detect_card().await.unwrap().is_none());
        // Silence on the bus is also "no card".
        assert!(reader.detect_card().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_ack_is_error() {
        let mut bus = ScriptedBus::default();
        bus.rx.extend([0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
        let mut reader = Pn532::new(bus);

        let err = reader.detect_card().await.unwrap_err();
        assert!(matches!(err, HardwareError::CommunicationError { .. }));
    }

    #[tokio::test]
    async fn test_transceive_requires_selected_card() {
        let mut reader = Pn532::new(ScriptedBus::default());
        let err = reader.transceive(&[0x90, 0x60, 0x00, 0x00, 0x00]).await.unwrap_err();
        assert!(matches!(err, HardwareError::CardError { .. }));
    }

    #[tokio::test]
    async fn test_transceive_exchanges_apdu() {
        let mut reader = reader_with_card(&[0x04, 0x01, 0x02, 0x03]);
        reader.detect_card().await.unwrap();
        reader
            .bus
            .reply(command::IN_DATA_EXCHANGE, &[0x00, 0xAF, 0x01, 0x02]);

        let reply = reader.transceive(&[0x90, 0x60, 0x00, 0x00, 0x00]).await.unwrap();

        assert_eq!(reply.as_ref(), &[0xAF, 0x01, 0x02]);
        let sent = reader.bus().writes.last().unwrap();
        assert_eq!(&sent[5..8], &[0xD4, command::IN_DATA_EXCHANGE, 0x01]);
    }

    #[tokio::test]
    async fn test_transceive_error_status_deselects() {
        let mut reader = reader_with_card(&[0x04, 0x01, 0x02, 0x03]);
        reader.detect_card().await.unwrap();
        reader.bus.reply(command::IN_DATA_EXCHANGE, &[0x01]);

        assert!(reader.transceive(&[0x00]).await.is_err());
        assert!(reader.transceive(&[0x00]).await.is_err());
        assert_eq!(reader.bus().writes.len(), 2);
    }
}
