//! Packet framing and command encoding.
//!
//! Two layers live here:
//!
//! - [`PacketFramer`] implements the tokio-util [`Decoder`] and [`Encoder`]
//!   traits so a byte stream (or an HTTP response body) can be split into
//!   consecutive [`Packet`]s.
//! - [`PacketCodec`] owns the outbound command counter and nonce clock and
//!   turns `(CommandType, payload)` pairs into wire bytes, and wire bytes
//!   into [`Command`]s.
//!
//! # Example
//!
//! ```
//! use attraccess_protocol::{CommandType, PacketCodec};
//!
//! let mut codec = PacketCodec::new();
//! let wire = codec.encode(CommandType::CardDetected, b"04ABCDEF").unwrap();
//!
//! let command = codec.decode(&wire).unwrap();
//! assert_eq!(command.cmd_type, CommandType::CardDetected);
//! assert_eq!(command.cmd_id, 1);
//! assert_eq!(command.data.as_ref(), b"04ABCDEF");
//! ```

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tokio_util::codec::{Decoder, Encoder};

use crate::command::{Command, CommandType};
use crate::error::{ProtocolError, Result};
use crate::packet::{MAX_PAYLOAD_SIZE, MIN_PACKET_SIZE, Packet};

/// Splits a byte stream into packets.
///
/// Payloads larger than the configured maximum are rejected as soon as the
/// header is visible, before the body is buffered.
#[derive(Debug)]
pub struct PacketFramer {
    max_payload_size: usize,
}

impl PacketFramer {
    pub fn new() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }

    /// Accept inbound payloads up to `max_payload_size` bytes.
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Decode every packet in a complete body.
    ///
    /// Stops at the first malformed packet; packets before it are returned
    /// alongside the error.
    pub fn decode_all(&mut self, body: &[u8]) -> (Vec<Packet>, Option<ProtocolError>) {
        let mut buf = BytesMut::from(body);
        let mut packets = Vec::new();
        loop {
            match self.decode_eof(&mut buf) {
                Ok(Some(packet)) => packets.push(packet),
                Ok(None) => return (packets, None),
                Err(e) => return (packets, Some(e)),
            }
        }
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketFramer {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        if src.len() < MIN_PACKET_SIZE {
            return Ok(None);
        }

        let data_len = Packet::peek_data_len(src)?;
        if data_len > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                len: data_len,
                max: self.max_payload_size,
            });
        }

        let total = MIN_PACKET_SIZE + data_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        Packet::decode(&frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => {
                let required = if src.len() < MIN_PACKET_SIZE {
                    MIN_PACKET_SIZE
                } else {
                    MIN_PACKET_SIZE + Packet::peek_data_len(src)?
                };
                Err(ProtocolError::Truncated {
                    len: src.len(),
                    required,
                })
            }
        }
    }
}

impl Encoder<Packet> for PacketFramer {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<()> {
        packet.encode(dst)
    }
}

/// Outbound command encoder and inbound command decoder.
///
/// Command ids start at 1 and wrap from 65535 to 0. The nonce is the
/// number of milliseconds since the codec was created, truncated to 32
/// bits; it is not verified on receipt.
#[derive(Debug)]
pub struct PacketCodec {
    last_cmd_id: u16,
    epoch: Instant,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self {
            last_cmd_id: 0,
            epoch: Instant::now(),
        }
    }

    /// Allocate the next command id.
    pub fn next_cmd_id(&mut self) -> u16 {
        self.last_cmd_id = self.last_cmd_id.wrapping_add(1);
        self.last_cmd_id
    }

    /// Id handed out by the most recent [`encode`](Self::encode).
    pub fn last_cmd_id(&self) -> u16 {
        self.last_cmd_id
    }

    fn nonce(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    /// Frame `data` as a packet of `cmd_type` with a fresh command id.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `data` does not fit in
    /// one packet. The command id is not consumed in that case.
    pub fn encode(&mut self, cmd_type: CommandType, data: &[u8]) -> Result<Bytes> {
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                len: data.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let packet = Packet::new(
            self.next_cmd_id(),
            cmd_type.code(),
            Bytes::copy_from_slice(data),
            self.nonce(),
        );
        packet.to_bytes()
    }

    /// Parse one command from the front of `bytes`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Command> {
        Packet::decode(bytes).map(Command::from)
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}
