//! Binary packet layout.
//!
//! All multi-byte fields are big-endian:
//!
//! ```text
//! +-------+---------+--------+----------+----------+---------+-------+
//! | magic | version | cmd_id | cmd_type | data_len |  data   | nonce |
//! |  u16  |   u8    |  u16   |    u8    |   u16    | n bytes |  u32  |
//! +-------+---------+--------+----------+----------+---------+-------+
//! ```
//!
//! A packet is therefore `12 + data_len` bytes long.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Packet magic, first two bytes of every packet.
pub const PACKET_MAGIC: u16 = 0xBA71;

/// The only protocol version understood.
pub const PROTOCOL_VERSION: u8 = 1;

/// Bytes before the payload: magic, version, cmd_id, cmd_type, data_len.
pub const HEADER_SIZE: usize = 8;

/// Bytes after the payload: nonce.
pub const TRAILER_SIZE: usize = 4;

/// Size of a packet with an empty payload.
pub const MIN_PACKET_SIZE: usize = HEADER_SIZE + TRAILER_SIZE;

/// Largest packet the reader will produce.
pub const MAX_PACKET_SIZE: usize = 64;

/// Largest payload that fits in [`MAX_PACKET_SIZE`].
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - MIN_PACKET_SIZE;

/// One framed packet, as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub cmd_id: u16,
    pub cmd_type: u8,
    pub data: Bytes,
    pub nonce: u32,
}

impl Packet {
    pub fn new(cmd_id: u16, cmd_type: u8, data: impl Into<Bytes>, nonce: u32) -> Self {
        Self {
            cmd_id,
            cmd_type,
            data: data.into(),
            nonce,
        }
    }

    /// Total encoded length.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        MIN_PACKET_SIZE + self.data.len()
    }

    /// Append the wire form of this packet to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`]. Nothing is written in that case.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        if self.data.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                len: self.data.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        dst.reserve(self.encoded_len());
        dst.put_u16(PACKET_MAGIC);
        dst.put_u8(PROTOCOL_VERSION);
        dst.put_u16(self.cmd_id);
        dst.put_u8(self.cmd_type);
        dst.put_u16(self.data.len() as u16);
        dst.put_slice(&self.data);
        dst.put_u32(self.nonce);
        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Parse one packet from the front of `src`.
    ///
    /// Trailing bytes after the nonce are ignored.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Truncated`] if `src` is shorter than the header
    ///   or than the declared payload plus nonce
    /// - [`ProtocolError::BadMagic`] if the magic does not match
    /// - [`ProtocolError::UnsupportedVersion`] for any version but 1
    pub fn decode(src: &[u8]) -> Result<Self> {
        let data_len = Self::peek_data_len(src)?;
        let required = MIN_PACKET_SIZE + data_len;
        if src.len() < required {
            return Err(ProtocolError::Truncated {
                len: src.len(),
                required,
            });
        }

        let mut buf = &src[..required];
        buf.advance(3);
        let cmd_id = buf.get_u16();
        let cmd_type = buf.get_u8();
        buf.advance(2);
        let data = Bytes::copy_from_slice(&buf[..data_len]);
        buf.advance(data_len);
        let nonce = buf.get_u32();

        Ok(Self {
            cmd_id,
            cmd_type,
            data,
            nonce,
        })
    }

    /// Validate the fixed header and return the declared payload length.
    pub(crate) fn peek_data_len(src: &[u8]) -> Result<usize> {
        if src.len() < MIN_PACKET_SIZE {
            return Err(ProtocolError::Truncated {
                len: src.len(),
                required: MIN_PACKET_SIZE,
            });
        }

        let magic = u16::from_be_bytes([src[0], src[1]]);
        if magic != PACKET_MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }

        let version = src[2];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        Ok(u16::from_be_bytes([src[6], src[7]]) as usize)
    }
}
