//! Scripted transport and socket for tests and offline runs.
//!
//! Both mocks share their state with a handle, so a test can keep
//! feeding responses while the channel or stream client owns the mock.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use attraccess_protocol::{CommandType, Packet};
use bytes::Bytes;

use crate::error::{Result, TransportError};
use crate::socket::{EventSocket, SocketRead};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct TransportState {
    responses: VecDeque<Result<HttpResponse>>,
    requests: Vec<HttpRequest>,
    network_available: bool,
    delay: Option<Duration>,
    next_server_cmd_id: u16,
}

/// [`HttpTransport`] answering from a script.
///
/// Unscripted requests get an empty 200.
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let shared = Arc::new(Mutex::new(TransportState {
            responses: VecDeque::new(),
            requests: Vec::new(),
            network_available: true,
            delay: None,
            next_server_cmd_id: 0x8000,
        }));
        let transport = Self {
            shared: Arc::clone(&shared),
        };
        (transport, MockTransportHandle { shared })
    }
}

impl HttpTransport for MockTransport {
    fn is_network_available(&self) -> bool {
        lock(&self.shared).network_available
    }

    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let (response, delay) = {
            let mut state = lock(&self.shared);
            state.requests.push(request);
            let response = state
                .responses
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(200, Bytes::new())));
            (response, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

/// Scripts responses and inspects requests of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    shared: Arc<Mutex<TransportState>>,
}

impl MockTransportHandle {
    pub fn push_response(&self, status: u16, body: impl Into<Bytes>) {
        lock(&self.shared)
            .responses
            .push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Answer the next request with 200 and one server command.
    pub fn push_command(&self, cmd_type: CommandType, data: &[u8]) {
        let mut state = lock(&self.shared);
        state.next_server_cmd_id = state.next_server_cmd_id.wrapping_add(1);
        let packet = Packet::new(
            state.next_server_cmd_id,
            cmd_type.code(),
            Bytes::copy_from_slice(data),
            0,
        );
        let body = packet.to_bytes().unwrap_or_default();
        state.responses.push_back(Ok(HttpResponse::new(200, body)));
    }

    pub fn push_error(&self, error: TransportError) {
        lock(&self.shared).responses.push_back(Err(error));
    }

    pub fn set_network_available(&self, available: bool) {
        lock(&self.shared).network_available = available;
    }

    /// Hold every response for `delay` before returning it.
    pub fn set_delay(&self, delay: Option<Duration>) {
        lock(&self.shared).delay = delay;
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.shared).requests.clone()
    }

    /// Requests decoded back into packets, skipping undecodable ones.
    pub fn sent_packets(&self) -> Vec<Packet> {
        lock(&self.shared)
            .requests
            .iter()
            .filter_map(|r| Packet::decode(&r.body).ok())
            .collect()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.shared).requests.len()
    }
}

#[derive(Debug, Default)]
struct SocketState {
    connected: bool,
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    connects: Vec<(String, u16)>,
    refuse: bool,
    peer_closed: bool,
}

/// [`EventSocket`] replaying bytes fed through its handle.
#[derive(Debug)]
pub struct ScriptedSocket {
    shared: Arc<Mutex<SocketState>>,
}

impl ScriptedSocket {
    pub fn new() -> (Self, ScriptedSocketHandle) {
        let shared = Arc::new(Mutex::new(SocketState::default()));
        let socket = Self {
            shared: Arc::clone(&shared),
        };
        (socket, ScriptedSocketHandle { shared })
    }
}

impl EventSocket for ScriptedSocket {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        let mut state = lock(&self.shared);
        state.connects.push((host.to_string(), port));
        if state.refuse {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
        }
        state.connected = true;
        state.peer_closed = false;
        Ok(())
    }

    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.shared);
        if !state.connected {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn try_read_byte(&mut self) -> io::Result<SocketRead> {
        let mut state = lock(&self.shared);
        if !state.connected {
            return Ok(SocketRead::Closed);
        }
        match state.incoming.pop_front() {
            Some(byte) => Ok(SocketRead::Byte(byte)),
            None if state.peer_closed => Ok(SocketRead::Closed),
            None => Ok(SocketRead::Pending),
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }

    fn close(&mut self) {
        let mut state = lock(&self.shared);
        state.connected = false;
        state.incoming.clear();
    }
}

/// Feeds and inspects a [`ScriptedSocket`].
#[derive(Debug, Clone)]
pub struct ScriptedSocketHandle {
    shared: Arc<Mutex<SocketState>>,
}

impl ScriptedSocketHandle {
    /// Queue bytes for the client to read.
    pub fn feed(&self, bytes: impl AsRef<[u8]>) {
        lock(&self.shared).incoming.extend(bytes.as_ref());
    }

    /// Peer closes once the queued bytes are drained.
    pub fn close_remote(&self) {
        lock(&self.shared).peer_closed = true;
    }

    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.shared).refuse = refuse;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared).connected
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.shared).connects.len()
    }

    pub fn last_connect(&self) -> Option<(String, u16)> {
        lock(&self.shared).connects.last().cloned()
    }

    /// Everything written so far, lossily decoded.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&lock(&self.shared).written).into_owned()
    }

    pub fn pending_bytes(&self) -> usize {
        lock(&self.shared).incoming.len()
    }
}
