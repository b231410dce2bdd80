//! Command kinds and decoded commands.

use bytes::Bytes;
use std::fmt;

use crate::error::{ProtocolError, Result};
use crate::packet::Packet;

/// Command type byte carried in every packet.
///
/// Unrecognised codes are preserved in [`CommandType::Unknown`] so the
/// caller can log and drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Device authentication handshake.
    DeviceAuth,
    /// Reader reports a button press.
    ButtonEvent,
    /// Reader reports a card UID.
    CardDetected,
    /// Server-driven card exchange, in both directions.
    CardOperation,
    /// Resource activation notice.
    ResourceActivate,
    /// Resource deactivation notice.
    ResourceDeactivate,
    /// Status update notice.
    StatusUpdate,
    /// Final authorization verdict from the server.
    AuthResult,
    /// Any other code.
    Unknown(u8),
}

impl CommandType {
    /// Map a wire code to a command type.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::DeviceAuth,
            0x02 => Self::ButtonEvent,
            0x03 => Self::CardDetected,
            0x10 => Self::CardOperation,
            0x20 => Self::ResourceActivate,
            0x21 => Self::ResourceDeactivate,
            0x30 => Self::StatusUpdate,
            0x40 => Self::AuthResult,
            other => Self::Unknown(other),
        }
    }

    /// Wire code of this command type.
    pub fn code(self) -> u8 {
        match self {
            Self::DeviceAuth => 0x01,
            Self::ButtonEvent => 0x02,
            Self::CardDetected => 0x03,
            Self::CardOperation => 0x10,
            Self::ResourceActivate => 0x20,
            Self::ResourceDeactivate => 0x21,
            Self::StatusUpdate => 0x30,
            Self::AuthResult => 0x40,
            Self::Unknown(code) => code,
        }
    }
}

impl From<u8> for CommandType {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceAuth => write!(f, "DeviceAuth"),
            Self::ButtonEvent => write!(f, "ButtonEvent"),
            Self::CardDetected => write!(f, "CardDetected"),
            Self::CardOperation => write!(f, "CardOperation"),
            Self::ResourceActivate => write!(f, "ResourceActivate"),
            Self::ResourceDeactivate => write!(f, "ResourceDeactivate"),
            Self::StatusUpdate => write!(f, "StatusUpdate"),
            Self::AuthResult => write!(f, "AuthResult"),
            Self::Unknown(code) => write!(f, "Unknown(0x{code:02X})"),
        }
    }
}

/// A command decoded from an inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub cmd_id: u16,
    pub cmd_type: CommandType,
    pub data: Bytes,
    /// Carried for logging only, never checked.
    pub nonce: u32,
}

impl From<Packet> for Command {
    fn from(packet: Packet) -> Self {
        Self {
            cmd_id: packet.cmd_id,
            cmd_type: CommandType::from_code(packet.cmd_type),
            data: packet.data,
            nonce: packet.nonce,
        }
    }
}

/// Sub-operation selector for [`CommandType::CardOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardOpType {
    /// Raw APDU exchange with the card.
    Transceive,
    SelectApplication,
    Authenticate,
    ReadData,
    WriteData,
    Unknown(u8),
}

impl CardOpType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::Transceive,
            0x02 => Self::SelectApplication,
            0x03 => Self::Authenticate,
            0x04 => Self::ReadData,
            0x05 => Self::WriteData,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Transceive => 0x01,
            Self::SelectApplication => 0x02,
            Self::Authenticate => 0x03,
            Self::ReadData => 0x04,
            Self::WriteData => 0x05,
            Self::Unknown(code) => code,
        }
    }

    /// Only raw transceive is executed by the reader.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Transceive)
    }
}

impl fmt::Display for CardOpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transceive => write!(f, "Transceive"),
            Self::SelectApplication => write!(f, "SelectApplication"),
            Self::Authenticate => write!(f, "Authenticate"),
            Self::ReadData => write!(f, "ReadData"),
            Self::WriteData => write!(f, "WriteData"),
            Self::Unknown(code) => write!(f, "Unknown(0x{code:02X})"),
        }
    }
}

/// Payload of a card operation command.
///
/// ```text
/// [op_type: u8][op_len: u8][op_data: op_len bytes]
/// ```
///
/// Bytes after `op_data` are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardOperation {
    pub op_type: CardOpType,
    pub data: Bytes,
}

impl CardOperation {
    /// Split a card operation payload.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::CardOperationTruncated`] if `payload` is shorter
    ///   than the two-byte header
    /// - [`ProtocolError::CardOperationLength`] if `op_len` exceeds the bytes
    ///   that follow the header
    pub fn parse(payload: &Bytes) -> Result<Self> {
        let [op, len, ..] = payload[..] else {
            return Err(ProtocolError::CardOperationTruncated { len: payload.len() });
        };

        let declared = len as usize;
        let available = payload.len() - 2;
        if declared > available {
            return Err(ProtocolError::CardOperationLength {
                declared,
                available,
            });
        }

        Ok(Self {
            op_type: CardOpType::from_code(op),
            data: payload.slice(2..2 + declared),
        })
    }
}
