//! Errors raised while framing or parsing binary packets.

/// Result type alias for packet operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Fewer bytes than the header or the declared payload require.
    #[error("Truncated packet: got {len} bytes, need {required}")]
    Truncated { len: usize, required: usize },

    /// First two bytes are not the packet magic.
    #[error("Bad magic: 0x{0:04X}")]
    BadMagic(u16),

    /// Version byte other than the supported one.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds what fits in one packet.
    #[error("Payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Card operation payload shorter than its two-byte header.
    #[error("Card operation header truncated: {len} bytes")]
    CardOperationTruncated { len: usize },

    /// Card operation length byte points past the end of the payload.
    #[error("Card operation declares {declared} data bytes, {available} present")]
    CardOperationLength { declared: usize, available: usize },

    /// I/O error from an underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
