//! Live resource status over a server-sent events stream.
//!
//! The client drives its own connection state machine from [`tick`]:
//!
//! ```text
//! Disconnected -> Connecting -> AwaitingHeaders -> Streaming
//!       ^                             |                |
//!       +-----------------------------+----------------+  (failure)
//! ```
//!
//! Every successfully parsed status event updates [`ResourceStatus`] and
//! is published to the indicators, the registered status subscribers and
//! the watch channel returned by [`subscribe`].
//!
//! [`tick`]: ResourceStatusStreamClient::tick
//! [`subscribe`]: ResourceStatusStreamClient::subscribe

pub mod endpoint;
pub mod header;
pub mod line;
pub mod status;

use std::fmt;
use std::time::Duration;

use attraccess_core::constants::{
    DEFAULT_REFRESH_INTERVAL_MS, KEEPALIVE_PAYLOAD, MAX_STREAM_BYTES_PER_TICK,
    STREAM_CONNECT_TIMEOUT_MS, STREAM_KEEPALIVE_TIMEOUT_MS,
};
use attraccess_core::{ResourceId, SubscriberList};
use attraccess_hardware::Indicator;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::socket::{EventSocket, SocketRead};

pub use endpoint::{Credentials, StreamEndpoint, events_url};
pub use header::HeaderFailure;
pub use line::{EventLine, LineBuffer};
pub use status::{ResourceStatus, StatusParseError, UsageEvent, parse_status_event};

/// Connection state of the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamConnectionState {
    Disconnected,
    Connecting,
    AwaitingHeaders,
    Streaming,
}

impl fmt::Display for StreamConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::AwaitingHeaders => write!(f, "AwaitingHeaders"),
            Self::Streaming => write!(f, "Streaming"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub api_url: String,
    pub resource_id: ResourceId,
    pub credentials: Option<Credentials>,
    /// Minimum spacing between connection attempts.
    pub refresh_interval: Duration,
    /// Time allowed for the TCP connect and for the response headers.
    pub connect_timeout: Duration,
    /// Silence tolerated while streaming.
    pub keepalive_timeout: Duration,
    pub max_bytes_per_tick: usize,
}

impl StreamConfig {
    pub fn new(api_url: impl Into<String>, resource_id: ResourceId) -> Self {
        Self {
            api_url: api_url.into(),
            resource_id,
            credentials: None,
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            connect_timeout: Duration::from_millis(STREAM_CONNECT_TIMEOUT_MS),
            keepalive_timeout: Duration::from_millis(STREAM_KEEPALIVE_TIMEOUT_MS),
            max_bytes_per_tick: MAX_STREAM_BYTES_PER_TICK,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// Keeps a resource's status current from the API's event stream.
pub struct ResourceStatusStreamClient<S> {
    config: StreamConfig,
    socket: S,
    state: StreamConnectionState,
    last_attempt: Option<Instant>,
    headers_deadline: Instant,
    last_data: Instant,
    line: LineBuffer,
    status_line_seen: bool,
    content_type_confirmed: bool,
    status: ResourceStatus,
    status_tx: watch::Sender<ResourceStatus>,
    subscribers: SubscriberList<bool>,
    in_use_indicator: Option<Box<dyn Indicator<bool>>>,
    status_text_indicator: Option<Box<dyn Indicator<str>>>,
    availability_indicator: Option<Box<dyn Indicator<bool>>>,
}

impl<S: EventSocket> ResourceStatusStreamClient<S> {
    pub fn new(config: StreamConfig, socket: S) -> Self {
        let now = Instant::now();
        let (status_tx, _) = watch::channel(ResourceStatus::default());
        Self {
            config,
            socket,
            state: StreamConnectionState::Disconnected,
            last_attempt: None,
            headers_deadline: now,
            last_data: now,
            line: LineBuffer::new(),
            status_line_seen: false,
            content_type_confirmed: false,
            status: ResourceStatus::default(),
            status_tx,
            subscribers: SubscriberList::new(),
            in_use_indicator: None,
            status_text_indicator: None,
            availability_indicator: None,
        }
    }

    /// Binary indicator fed with `in_use` on every status update.
    pub fn with_in_use_indicator(mut self, indicator: impl Indicator<bool> + 'static) -> Self {
        self.set_in_use_indicator(indicator);
        self
    }

    /// Text indicator fed with "In Use" or "Available".
    pub fn with_status_text_indicator(mut self, indicator: impl Indicator<str> + 'static) -> Self {
        self.set_status_text_indicator(indicator);
        self
    }

    /// Binary indicator fed with stream availability.
    pub fn with_availability_indicator(mut self, indicator: impl Indicator<bool> + 'static) -> Self {
        self.set_availability_indicator(indicator);
        self
    }

    pub fn set_in_use_indicator(&mut self, indicator: impl Indicator<bool> + 'static) {
        self.in_use_indicator = Some(Box::new(indicator));
    }

    pub fn set_status_text_indicator(&mut self, indicator: impl Indicator<str> + 'static) {
        self.status_text_indicator = Some(Box::new(indicator));
    }

    pub fn set_availability_indicator(&mut self, indicator: impl Indicator<bool> + 'static) {
        self.availability_indicator = Some(Box::new(indicator));
    }

    /// Call `listener` with `in_use` on every status update.
    pub fn register_status_callback<F>(&mut self, listener: F)
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.subscribers.register(listener);
    }

    /// Snapshot channel of the latest status.
    pub fn subscribe(&self) -> watch::Receiver<ResourceStatus> {
        self.status_tx.subscribe()
    }

    /// Advance the connection state machine by one step.
    pub async fn tick(&mut self) {
        let now = Instant::now();
        match self.state {
            StreamConnectionState::Disconnected | StreamConnectionState::Connecting => {
                let due = self
                    .last_attempt
                    .is_none_or(|t| now.saturating_duration_since(t) >= self.config.refresh_interval);
                if due {
                    self.connect().await;
                }
            }
            StreamConnectionState::AwaitingHeaders => {
                if now >= self.headers_deadline {
                    warn!(
                        timeout_ms = self.config.connect_timeout.as_millis() as u64,
                        "Event stream response headers not received"
                    );
                    self.disconnect();
                    return;
                }
                self.pump(now);
            }
            StreamConnectionState::Streaming => {
                let silent = now.saturating_duration_since(self.last_data);
                if silent > self.config.keepalive_timeout {
                    warn!(
                        silent_ms = silent.as_millis() as u64,
                        "No data on event stream, forcing reconnect"
                    );
                    self.disconnect();
                    return;
                }
                self.pump(now);
            }
        }
    }

    /// Open the socket and send the stream request.
    pub async fn connect(&mut self) {
        let now = Instant::now();
        self.last_attempt = Some(now);
        self.socket.close();
        self.reset_parser();
        self.state = StreamConnectionState::Connecting;
        self.publish_availability(false);

        let endpoint = match StreamEndpoint::resolve(&self.config.api_url, &self.config.resource_id) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!(api_url = %self.config.api_url, error = %e, "Cannot resolve event stream endpoint");
                self.state = StreamConnectionState::Disconnected;
                return;
            }
        };

        debug!(url = %endpoint, "Connecting to event stream");
        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, self.socket.connect(&endpoint.host, endpoint.port)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(host = %endpoint.host, port = endpoint.port, error = %e, "Failed to connect to event stream");
                self.disconnect();
                return;
            }
            Err(_) => {
                error!(
                    host = %endpoint.host,
                    port = endpoint.port,
                    timeout_ms = timeout.as_millis() as u64,
                    "Event stream connect timed out"
                );
                self.disconnect();
                return;
            }
        }

        let request = endpoint.request(self.config.credentials.as_ref());
        if let Err(e) = self.socket.write_all(request.as_bytes()).await {
            error!(error = %e, "Failed to send event stream request");
            self.disconnect();
            return;
        }

        let sent = Instant::now();
        self.headers_deadline = sent + self.config.connect_timeout;
        self.last_data = sent;
        self.state = StreamConnectionState::AwaitingHeaders;
        debug!(path = %endpoint.path, "Event stream request sent");
    }

    fn disconnect(&mut self) {
        self.socket.close();
        self.reset_parser();
        if self.state == StreamConnectionState::Streaming {
            info!("Event stream disconnected");
        }
        self.state = StreamConnectionState::Disconnected;
        self.publish_availability(false);
    }

    fn reset_parser(&mut self) {
        self.line.clear();
        self.status_line_seen = false;
        self.content_type_confirmed = false;
    }

    fn pump(&mut self, now: Instant) {
        for _ in 0..self.config.max_bytes_per_tick {
            match self.socket.try_read_byte() {
                Ok(SocketRead::Byte(byte)) => {
                    self.last_data = now;
                    if let Some(line) = self.line.push(byte) {
                        self.process_line(&line);
                        if self.state == StreamConnectionState::Disconnected {
                            return;
                        }
                    }
                }
                Ok(SocketRead::Pending) => return,
                Ok(SocketRead::Closed) => {
                    warn!(state = %self.state, "Event stream connection closed by server");
                    self.disconnect();
                    return;
                }
                Err(e) => {
                    warn!(state = %self.state, error = %e, "Event stream read failed");
                    self.disconnect();
                    return;
                }
            }
        }
    }

    fn process_line(&mut self, line: &str) {
        match self.state {
            StreamConnectionState::AwaitingHeaders => self.process_header_line(line),
            StreamConnectionState::Streaming => self.process_event_line(line),
            _ => {}
        }
    }

    fn process_header_line(&mut self, line: &str) {
        if !self.status_line_seen {
            self.status_line_seen = true;
            match header::parse_status_line(line).and_then(header::check_status) {
                Ok(code) => debug!(status = code, "Event stream response accepted"),
                Err(failure) => {
                    error!(reason = %failure, status_line = line, "Event stream connection refused");
                    self.disconnect();
                }
            }
            return;
        }

        if line.is_empty() {
            if !self.content_type_confirmed {
                warn!("Event stream response has no text/event-stream content type");
            }
            self.state = StreamConnectionState::Streaming;
            self.publish_availability(true);
            info!(resource_id = %self.config.resource_id, "Event stream connected");
            return;
        }

        if header::is_event_stream_content_type(line) {
            self.content_type_confirmed = true;
        }
        trace!(header = line, "Event stream header");
    }

    fn process_event_line(&mut self, line: &str) {
        match EventLine::classify(line) {
            EventLine::Blank | EventLine::Comment(_) => {}
            EventLine::Id(id) => debug!(id, "Event id"),
            EventLine::Event(event) => debug!(event, "Event type"),
            EventLine::Data(payload) if payload == KEEPALIVE_PAYLOAD => trace!("Keepalive"),
            EventLine::Data(payload) => match parse_status_event(payload) {
                Ok(status) => self.apply_status(status),
                Err(e) => warn!(error = %e, payload, "Dropping status event"),
            },
            EventLine::Other(other) => trace!(line = other, "Ignoring event stream line"),
        }
    }

    fn apply_status(&mut self, status: ResourceStatus) {
        match status.last_event_type.as_deref().map(UsageEvent::classify) {
            Some(UsageEvent::Started) => info!("Resource usage started"),
            Some(UsageEvent::Ended) => info!("Resource usage ended"),
            Some(UsageEvent::Other(event)) => debug!(event, "Resource event"),
            None => {}
        }
        info!(in_use = status.in_use, status = status.status_text(), "Resource status updated");

        if let Some(indicator) = self.in_use_indicator.as_mut() {
            indicator.publish(&status.in_use);
        }
        if let Some(indicator) = self.status_text_indicator.as_mut() {
            indicator.publish(status.status_text());
        }
        self.subscribers.notify(&status.in_use);
        self.status = status.clone();
        self.status_tx.send_replace(status);
    }

    fn publish_availability(&mut self, available: bool) {
        if let Some(indicator) = self.availability_indicator.as_mut() {
            indicator.publish(&available);
        }
    }

    /// Log the effective configuration with secrets redacted.
    pub fn dump_config(&self) {
        let (username, password) = match &self.config.credentials {
            Some(credentials) => (credentials.username.as_str(), "[REDACTED]"),
            None => ("<none>", "<none>"),
        };
        info!(
            api_url = %self.config.api_url,
            resource_id = %self.config.resource_id,
            refresh_interval_ms = self.config.refresh_interval.as_millis() as u64,
            username,
            password,
            "Resource status stream configuration"
        );
    }

    /// Whether the stream is connected and delivering events.
    pub fn is_api_available(&self) -> bool {
        self.state == StreamConnectionState::Streaming
    }

    /// Whether the resource is free to use.
    pub fn is_active(&self) -> bool {
        !self.status.in_use
    }

    pub fn state(&self) -> StreamConnectionState {
        self.state
    }

    pub fn status(&self) -> &ResourceStatus {
        &self.status
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.config.resource_id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

impl<S> fmt::Debug for ResourceStatusStreamClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStatusStreamClient")
            .field("state", &self.state)
            .field("status", &self.status)
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}
