//! Binary packet protocol spoken between the reader and the Attraccess API.
//!
//! - [`packet`]: wire layout, constants and strict single-packet parsing
//! - [`command`]: command and card-operation types
//! - [`codec`]: stream framing and the outbound command encoder
//! - [`queue`]: FIFO of decoded inbound commands

pub mod codec;
pub mod command;
pub mod error;
pub mod packet;
pub mod queue;

pub use codec::{PacketCodec, PacketFramer};
pub use command::{CardOpType, CardOperation, Command, CommandType};
pub use error::{ProtocolError, Result};
pub use packet::{
    MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE, MIN_PACKET_SIZE, PACKET_MAGIC, PROTOCOL_VERSION, Packet,
};
pub use queue::CommandQueue;
