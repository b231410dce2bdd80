//! Byte-stream socket used by the event stream client.
//!
//! Reads are non-blocking and byte-at-a-time so the stream client can cap
//! how much it consumes per tick.

#![allow(async_fn_in_trait)]

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Outcome of a non-blocking single-byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRead {
    Byte(u8),
    /// Nothing buffered right now.
    Pending,
    /// Peer closed the connection or the socket is not connected.
    Closed,
}

pub trait EventSocket: Send {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Take one byte if one is available, never waiting.
    fn try_read_byte(&mut self) -> io::Result<SocketRead>;

    fn is_connected(&self) -> bool;

    fn close(&mut self);
}

const READ_CHUNK: usize = 512;

/// [`EventSocket`] over a tokio TCP stream.
#[derive(Debug, Default)]
pub struct TcpEventSocket {
    stream: Option<TcpStream>,
    buf: BytesMut,
}

impl TcpEventSocket {
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&mut self) -> io::Result<SocketRead> {
        let Some(stream) = self.stream.as_ref() else {
            return Ok(SocketRead::Closed);
        };

        self.buf.reserve(READ_CHUNK);
        match stream.try_read_buf(&mut self.buf) {
            Ok(0) => Ok(SocketRead::Closed),
            Ok(n) => {
                debug!(bytes = n, "Socket read");
                Ok(SocketRead::Pending)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(SocketRead::Pending),
            Err(e) => Err(e),
        }
    }
}

impl EventSocket for TcpEventSocket {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.close();
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.write_all(bytes).await,
            None => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    fn try_read_byte(&mut self) -> io::Result<SocketRead> {
        if self.buf.is_empty() {
            match self.fill()? {
                SocketRead::Closed => return Ok(SocketRead::Closed),
                _ if self.buf.is_empty() => return Ok(SocketRead::Pending),
                _ => {}
            }
        }
        Ok(SocketRead::Byte(self.buf.get_u8()))
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn close(&mut self) {
        self.stream = None;
        self.buf.clear();
    }
}
