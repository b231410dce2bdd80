//! Composition root: wires the stream client, request channel and engine
//! and drives them from one tick loop.

use std::future::Future;
use std::time::Duration;

use attraccess_core::constants::{
    API_REQUEST_TIMEOUT_MS, DEFAULT_CARD_TIMEOUT_MS, DEFAULT_REFRESH_INTERVAL_MS,
};
use attraccess_core::{ResourceId, Result};
use attraccess_hardware::{Button, CardReader, StatusLed};
use attraccess_network::channel::{default_device_id, default_endpoint};
use attraccess_network::{
    ChannelConfig, Credentials, EventSocket, HttpTransport, RemoteRequestChannel,
    ResourceStatusStreamClient, StreamConfig,
};
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::engine::CardTransactionEngine;

/// Everything needed to talk to one Attraccess resource.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_url: String,
    pub resource_id: ResourceId,
    pub credentials: Option<Credentials>,
    pub refresh_interval: Duration,
    /// Defaults to `{api_url}/desfire/proxy`.
    pub endpoint: Option<String>,
    /// Defaults to `resource-{resource_id}-desfire-reader`.
    pub device_id: Option<String>,
    pub api_key: Option<String>,
    pub card_timeout: Duration,
    pub request_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(api_url: impl Into<String>, resource_id: ResourceId) -> Self {
        Self {
            api_url: api_url.into(),
            resource_id,
            credentials: None,
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            endpoint: None,
            device_id: None,
            api_key: None,
            card_timeout: Duration::from_millis(DEFAULT_CARD_TIMEOUT_MS),
            request_timeout: Duration::from_millis(API_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        let config = StreamConfig::new(self.api_url.clone(), self.resource_id.clone())
            .with_refresh_interval(self.refresh_interval);
        match &self.credentials {
            Some(credentials) => config.with_credentials(credentials.clone()),
            None => config,
        }
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            endpoint: Some(
                self.endpoint
                    .clone()
                    .unwrap_or_else(|| default_endpoint(&self.api_url)),
            ),
            device_id: Some(
                self.device_id
                    .clone()
                    .unwrap_or_else(|| default_device_id(&self.resource_id)),
            ),
            api_key: self.api_key.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

/// The reader's local peripherals.
#[derive(Debug)]
pub struct Devices<R, L, B> {
    pub reader: R,
    pub led: L,
    pub button: B,
}

/// Stream client and card engine, ticked together.
pub struct Gateway<R, L, B, T, S> {
    engine: CardTransactionEngine<R, L, B, T>,
    stream: ResourceStatusStreamClient<S>,
}

impl<R, L, B, T, S> Gateway<R, L, B, T, S>
where
    R: CardReader,
    L: StatusLed,
    B: Button,
    T: HttpTransport,
    S: EventSocket,
{
    /// Build the stream client, request channel and engine from `config`.
    ///
    /// # Errors
    ///
    /// Propagates the engine builder's setup errors.
    pub fn assemble(
        config: GatewayConfig,
        devices: Devices<R, L, B>,
        transport: T,
        socket: S,
    ) -> Result<Self> {
        let stream = ResourceStatusStreamClient::new(config.stream_config(), socket);
        let channel = RemoteRequestChannel::new(config.channel_config(), transport);

        let engine = CardTransactionEngine::builder()
            .reader(devices.reader)
            .led(devices.led)
            .button(devices.button)
            .channel(channel)
            .resource_status(stream.subscribe())
            .resource_id(config.resource_id)
            .card_timeout(config.card_timeout)
            .build()?;

        Ok(Self { engine, stream })
    }

    pub fn new(engine: CardTransactionEngine<R, L, B, T>, stream: ResourceStatusStreamClient<S>) -> Self {
        Self { engine, stream }
    }

    /// One step of the stream client, then one of the engine.
    pub async fn tick(&mut self) {
        self.stream.tick().await;
        self.engine.tick().await;
    }

    /// Tick every `interval` until `shutdown` resolves.
    pub async fn run<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_ms = interval.as_millis() as u64, "Gateway running");
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping gateway");
                    break;
                }
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    pub fn dump_config(&self) {
        self.stream.dump_config();
        self.engine.dump_config();
    }

    pub fn engine(&self) -> &CardTransactionEngine<R, L, B, T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut CardTransactionEngine<R, L, B, T> {
        &mut self.engine
    }

    pub fn stream(&self) -> &ResourceStatusStreamClient<S> {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut ResourceStatusStreamClient<S> {
        &mut self.stream
    }
}
