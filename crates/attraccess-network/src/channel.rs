//! Request/response channel to the Attraccess reader proxy.
//!
//! Every outbound command is one binary POST. A 200 response may carry the
//! server's next command, which is decoded into the [`CommandQueue`]. Only
//! one request may be outstanding; the channel tracks it in
//! [`PendingRequest`] and gates the queue while it is being awaited.

use std::time::Duration;

use attraccess_core::constants::API_REQUEST_TIMEOUT_MS;
use attraccess_core::ResourceId;
use attraccess_protocol::{Command, CommandQueue, CommandType, PacketCodec, PacketFramer};
use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::transport::{HttpRequest, HttpTransport};

/// Where and as whom requests are sent.
#[derive(Clone)]
pub struct ChannelConfig {
    pub endpoint: Option<String>,
    pub device_id: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl ChannelConfig {
    /// Proxy endpoint and device id derived from the API URL and resource.
    pub fn for_resource(api_url: &str, resource_id: &ResourceId) -> Self {
        Self {
            endpoint: Some(default_endpoint(api_url)),
            device_id: Some(default_device_id(resource_id)),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            device_id: None,
            api_key: None,
            request_timeout: Duration::from_millis(API_REQUEST_TIMEOUT_MS),
        }
    }
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("endpoint", &self.endpoint)
            .field("device_id", &self.device_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// `{api_url}/desfire/proxy`, without doubling the slash.
pub fn default_endpoint(api_url: &str) -> String {
    format!("{}/desfire/proxy", api_url.trim_end_matches('/'))
}

pub fn default_device_id(resource_id: &ResourceId) -> String {
    format!("resource-{resource_id}-desfire-reader")
}

/// Book-keeping for the request most recently accepted by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub sent_at: Instant,
    pub awaiting: bool,
}

impl PendingRequest {
    fn idle() -> Self {
        Self {
            sent_at: Instant::now(),
            awaiting: false,
        }
    }
}

/// Sends commands to the reader proxy and queues the commands it answers
/// with.
///
/// # Examples
///
/// ```no_run
/// use attraccess_network::{ChannelConfig, RemoteRequestChannel, ReqwestTransport};
/// use attraccess_protocol::CommandType;
/// use std::time::Duration;
///
/// # async fn demo() -> attraccess_network::Result<()> {
/// let transport = ReqwestTransport::new(Duration::from_secs(5))?;
/// let config = ChannelConfig::default().with_endpoint("http://attraccess.local/api/desfire/proxy");
/// let mut channel = RemoteRequestChannel::new(config, transport);
///
/// if channel.send(CommandType::ButtonEvent, b"42").await {
///     channel.poll();
///     if let Some(command) = channel.next_command() {
///         println!("server answered with {}", command.cmd_type);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RemoteRequestChannel<T> {
    config: ChannelConfig,
    transport: T,
    codec: PacketCodec,
    framer: PacketFramer,
    queue: CommandQueue,
    pending: PendingRequest,
}

impl<T: HttpTransport> RemoteRequestChannel<T> {
    pub fn new(config: ChannelConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            codec: PacketCodec::new(),
            // Server packets are not bound by the reader's outbound limit.
            framer: PacketFramer::with_max_payload_size(u16::MAX as usize),
            queue: CommandQueue::new(),
            pending: PendingRequest::idle(),
        }
    }

    /// Send one command, logging any failure.
    ///
    /// Returns `true` only when the server answered 200.
    pub async fn send(&mut self, cmd_type: CommandType, payload: &[u8]) -> bool {
        match self.try_send(cmd_type, payload).await {
            Ok(()) => true,
            Err(e) => {
                error!(cmd_type = %cmd_type, error = %e, "API request failed");
                false
            }
        }
    }

    /// Send one command.
    ///
    /// # Errors
    ///
    /// - [`TransportError::NoEndpoint`], [`TransportError::NetworkUnavailable`]
    ///   or [`TransportError::RequestInFlight`] before anything is sent
    /// - [`TransportError::Protocol`] if `payload` does not fit in a packet
    /// - [`TransportError::Timeout`] if no response arrives within the
    ///   request timeout
    /// - [`TransportError::Status`] for any status other than 200
    ///
    /// `awaiting` is only set on success.
    pub async fn try_send(&mut self, cmd_type: CommandType, payload: &[u8]) -> Result<()> {
        let endpoint = self
            .config
            .endpoint
            .clone()
            .ok_or(TransportError::NoEndpoint)?;
        if !self.transport.is_network_available() {
            return Err(TransportError::NetworkUnavailable);
        }
        if self.pending.awaiting {
            return Err(TransportError::RequestInFlight);
        }

        let body = self.codec.encode(cmd_type, payload)?;
        let cmd_id = self.codec.last_cmd_id();

        let mut request = HttpRequest::post(&endpoint, body);
        if let Some(device_id) = &self.config.device_id {
            request = request.header("X-Device-ID", device_id);
        }
        if let Some(api_key) = &self.config.api_key {
            request = request.header("X-API-Key", api_key);
        }

        info!(
            endpoint = %endpoint,
            cmd_type = %cmd_type,
            cmd_id,
            data_len = payload.len(),
            "Sending API request"
        );

        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, self.transport.post(request))
            .await
            .map_err(|_| TransportError::timeout(timeout))??;

        if !response.is_ok() {
            return Err(TransportError::Status(response.status));
        }

        debug!(cmd_id, body_len = response.body.len(), "API request accepted");
        self.pending = PendingRequest {
            sent_at: Instant::now(),
            awaiting: true,
        };
        self.enqueue_response(&response.body);

        Ok(())
    }

    fn enqueue_response(&mut self, body: &Bytes) {
        if body.is_empty() {
            debug!("Empty response body, no command");
            return;
        }

        let (packets, err) = self.framer.decode_all(body);
        for packet in packets {
            let command = Command::from(packet);
            debug!(
                cmd_id = command.cmd_id,
                cmd_type = %command.cmd_type,
                nonce = command.nonce,
                data_len = command.data.len(),
                "Queued server command"
            );
            self.queue.push(command);
        }
        if let Some(e) = err {
            warn!(error = %e, body_len = body.len(), "Discarding undecodable response data");
        }
    }

    /// Release the request gate.
    ///
    /// The transport is strictly request/response, so by the time `poll`
    /// runs the awaited response has been read in full and its command, if
    /// any, already sits in the queue.
    pub fn poll(&mut self) {
        if self.pending.awaiting {
            trace!(queued = self.queue.len(), "Response consumed, releasing request gate");
            self.pending.awaiting = false;
        }
    }

    /// Clear an awaited request older than the request timeout.
    ///
    /// Returns `true` when the request was abandoned.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        if !self.pending.awaiting {
            return false;
        }
        let elapsed = now.saturating_duration_since(self.pending.sent_at);
        if elapsed <= self.config.request_timeout {
            return false;
        }

        warn!(
            elapsed_ms = elapsed.as_millis() as u64,
            "API request timed out waiting for response"
        );
        self.pending.awaiting = false;
        true
    }

    /// Oldest queued command, unless a request is still awaited.
    pub fn next_command(&mut self) -> Option<Command> {
        self.queue.pop_if_ready(self.pending.awaiting)
    }

    /// Drop every queued command, returning how many were discarded.
    pub fn clear_queue(&mut self) -> usize {
        self.queue.clear()
    }

    pub fn is_awaiting(&self) -> bool {
        self.pending.awaiting
    }

    pub fn pending(&self) -> PendingRequest {
        self.pending
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_endpoint_strips_trailing_slash() {
        assert_eq!(
            default_endpoint("http://attraccess.local/api/"),
            "http://attraccess.local/api/desfire/proxy"
        );
        assert_eq!(
            default_endpoint("http://attraccess.local"),
            "http://attraccess.local/desfire/proxy"
        );
    }

    #[test]
    fn test_default_device_id() {
        let id: ResourceId = "7".parse().unwrap();
        assert_eq!(default_device_id(&id), "resource-7-desfire-reader");
    }

    #[test]
    fn test_for_resource_uses_default_timeout() {
        let id: ResourceId = "7".parse().unwrap();
        let config = ChannelConfig::for_resource("http://a", &id);
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.endpoint.as_deref(), Some("http://a/desfire/proxy"));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ChannelConfig::default().with_api_key("s3cret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
