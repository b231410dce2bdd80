//! Network side of the Attraccess reader.
//!
//! - [`channel`]: one-request-at-a-time binary POST channel to the reader
//!   proxy, feeding server commands into a queue
//! - [`stream`]: resource status client over a server-sent events stream
//! - [`transport`] and [`socket`]: the I/O seams both are generic over
//! - [`mock`]: scripted transport and socket

pub mod channel;
pub mod error;
pub mod mock;
pub mod socket;
pub mod stream;
pub mod transport;

pub use channel::{ChannelConfig, PendingRequest, RemoteRequestChannel};
pub use error::{Result, TransportError};
pub use socket::{EventSocket, SocketRead, TcpEventSocket};
pub use stream::{
    Credentials, ResourceStatus, ResourceStatusStreamClient, StatusParseError, StreamConfig,
    StreamConnectionState,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
