//! The card transaction engine.
//!
//! One [`tick`](CardTransactionEngine::tick) runs, in order:
//!
//! 1. pick up the latest resource status snapshot
//! 2. sample the button and handle a rising edge
//! 3. abandon a timed-out API request, or release the request gate
//! 4. run the handler of the current [`CardState`]
//!
//! A request accepted by the state handler keeps the gate closed until the
//! next tick. If that tick comes later than the request timeout, an open
//! transaction goes to `Error`.
//!
//! The engine never spawns tasks. Every await inside a tick is bounded: API
//! requests by the request timeout, LED patterns by their length.

use std::time::Duration;

use attraccess_core::constants::DEFAULT_CARD_TIMEOUT_MS;
use attraccess_core::{CardUid, Error, ResourceId, Result, SubscriberList};
use attraccess_hardware::{Button, CardReader, ReaderInfo, StatusLed};
use attraccess_network::{HttpTransport, RemoteRequestChannel, ResourceStatus};
use attraccess_protocol::{CardOperation, Command, CommandType};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::led::{BlinkPattern, blink, set_led};
use crate::state::{CardState, CardStateMachine, StateTransition};

/// Drives one reader through button press, card detection, server-driven
/// card operations and the final verdict.
pub struct CardTransactionEngine<R, L, B, T> {
    reader: R,
    led: L,
    button: B,
    channel: RemoteRequestChannel<T>,
    resource_status: watch::Receiver<ResourceStatus>,
    resource_in_use: bool,
    resource_id: ResourceId,
    machine: CardStateMachine,
    card_timeout: Duration,
    last_card_read: Instant,
    current_uid: Option<CardUid>,
    button_was_pressed: bool,
    card_read_subscribers: SubscriberList<str>,
    authorized_subscribers: SubscriberList<()>,
    denied_subscribers: SubscriberList<()>,
}

impl<R, L, B, T> CardTransactionEngine<R, L, B, T>
where
    R: CardReader,
    L: StatusLed,
    B: Button,
    T: HttpTransport,
{
    pub fn builder() -> EngineBuilder<R, L, B, T> {
        EngineBuilder::default()
    }

    /// Call `listener` with the uppercase hex UID of every card read.
    pub fn on_card_read<F>(&mut self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.card_read_subscribers.register(listener);
    }

    pub fn on_authorized<F>(&mut self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.authorized_subscribers.register(move |_: &()| listener());
    }

    pub fn on_denied<F>(&mut self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.denied_subscribers.register(move |_: &()| listener());
    }

    /// Bring up the card reader.
    ///
    /// # Errors
    ///
    /// Returns the reader's error if it does not answer or cannot be
    /// configured.
    pub async fn init_reader(&mut self) -> attraccess_hardware::Result<ReaderInfo> {
        let info = self.reader.init().await?;
        info!(reader = %info, "Card reader ready");
        Ok(info)
    }

    /// Advance the transaction by one step.
    pub async fn tick(&mut self) {
        self.observe_resource_status();

        if self.button_edge() {
            self.handle_button_press().await;
        }

        self.service_channel();

        match self.machine.current_state() {
            CardState::Idle => {}
            CardState::WaitForCard => self.poll_for_card().await,
            CardState::CardDetected | CardState::ExecutingCommand => {
                self.dispatch_next_command().await;
                self.check_card_timeout();
            }
            CardState::Authorized => {
                blink(&mut self.led, BlinkPattern::SUCCESS).await;
                self.reset("authorized");
            }
            CardState::Denied => {
                blink(&mut self.led, BlinkPattern::ERROR).await;
                self.reset("denied");
            }
            CardState::Error => {
                blink(&mut self.led, BlinkPattern::ERROR).await;
                self.reset("error");
            }
        }
    }

    fn observe_resource_status(&mut self) {
        if !self.resource_status.has_changed().unwrap_or(false) {
            return;
        }
        let in_use = self.resource_status.borrow_and_update().in_use;
        if in_use != self.resource_in_use {
            info!(in_use, "Resource status changed");
        }
        self.resource_in_use = in_use;
    }

    fn button_edge(&mut self) -> bool {
        let pressed = self.button.is_pressed();
        let edge = pressed && !self.button_was_pressed;
        self.button_was_pressed = pressed;
        edge
    }

    async fn handle_button_press(&mut self) {
        let state = self.machine.current_state();
        if state != CardState::Idle {
            debug!(state = %state, "Button press ignored");
            return;
        }

        info!("Button pressed, notifying API");
        set_led(&mut self.led, true);

        let payload = self.resource_id.as_str().as_bytes();
        if self.channel.send(CommandType::ButtonEvent, payload).await {
            self.enter(CardState::WaitForCard);
        } else {
            error!("Failed to send button event to API");
            blink(&mut self.led, BlinkPattern::SEND_FAILURE).await;
            set_led(&mut self.led, false);
        }
    }

    async fn poll_for_card(&mut self) {
        let uid = match self.reader.detect_card().await {
            Ok(Some(uid)) => uid,
            Ok(None) => {
                trace!("No card detected");
                return;
            }
            Err(e) => {
                debug!(error = %e, "Card detection failed");
                return;
            }
        };

        let hex = uid.to_hex();
        info!(uid = %hex, "Card detected");
        self.card_read_subscribers.notify(&hex);
        self.current_uid = Some(uid);

        if self.channel.send(CommandType::CardDetected, hex.as_bytes()).await {
            self.last_card_read = Instant::now();
            self.enter(CardState::CardDetected);
        } else {
            error!(uid = %hex, "Failed to notify API about card detection");
            self.enter(CardState::Error);
        }
    }

    async fn dispatch_next_command(&mut self) {
        let Some(command) = self.channel.next_command() else {
            return;
        };
        debug!(
            cmd_id = command.cmd_id,
            cmd_type = %command.cmd_type,
            nonce = command.nonce,
            "Dispatching server command"
        );

        match command.cmd_type {
            CommandType::CardOperation => self.execute_card_operation(&command).await,
            CommandType::ResourceActivate => {
                info!("Resource activation command received");
                set_led(&mut self.led, true);
            }
            CommandType::ResourceDeactivate => {
                info!("Resource deactivation command received");
                set_led(&mut self.led, false);
            }
            CommandType::AuthResult => match command.data.first() {
                Some(&0) => {
                    info!("Authentication failed");
                    self.enter(CardState::Denied);
                    self.denied_subscribers.notify(&());
                }
                Some(_) => {
                    info!("Authentication successful");
                    self.enter(CardState::Authorized);
                    self.authorized_subscribers.notify(&());
                }
                None => warn!(cmd_id = command.cmd_id, "Authentication result without data, dropping"),
            },
            other => warn!(cmd_id = command.cmd_id, cmd_type = %other, "Unsupported command type, dropping"),
        }
    }

    async fn execute_card_operation(&mut self, command: &Command) {
        let op = match CardOperation::parse(&command.data) {
            Ok(op) => op,
            Err(e) => {
                warn!(cmd_id = command.cmd_id, error = %e, "Malformed card operation, dropping");
                return;
            }
        };
        if !op.op_type.is_supported() {
            warn!(cmd_id = command.cmd_id, op_type = %op.op_type, "Unsupported card operation, dropping");
            return;
        }

        self.enter(CardState::ExecutingCommand);

        let reply = match self.reader.transceive(&op.data).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(cmd_id = command.cmd_id, error = %e, "Card transceive failed");
                self.enter(CardState::Error);
                return;
            }
        };
        debug!(apdu_len = op.data.len(), reply_len = reply.len(), "Card transceive complete");

        if self.channel.send(CommandType::CardOperation, &reply).await {
            info!(cmd_id = command.cmd_id, "Card operation executed");
        } else {
            error!(cmd_id = command.cmd_id, "Failed to send card response to API");
            self.enter(CardState::Error);
        }
    }

    fn check_card_timeout(&mut self) {
        if !self.machine.current_state().is_transaction_open() {
            return;
        }
        let elapsed = self.last_card_read.elapsed();
        if elapsed > self.card_timeout {
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Card operation timeout");
            self.reset("card timeout");
        }
    }

    fn service_channel(&mut self) {
        if self.channel.check_timeout(Instant::now()) {
            if self.machine.current_state().is_transaction_open() {
                self.enter(CardState::Error);
            }
        } else {
            self.channel.poll();
        }
    }

    fn enter(&mut self, state: CardState) {
        if self.machine.current_state() == state {
            return;
        }
        match self.machine.transition_to(state) {
            Ok(StateTransition { from, to, .. }) => debug!(from = %from, to = %to, "State transition"),
            Err(e) => error!(error = %e, "Rejected state transition"),
        }
    }

    /// Back to `Idle`: LED off, card forgotten, queued commands discarded.
    fn reset(&mut self, reason: &str) {
        let dropped = self.channel.clear_queue();
        let transition = self.machine.reset();
        self.current_uid = None;
        set_led(&mut self.led, false);
        info!(from = %transition.from, reason, dropped, "Card transaction reset");
    }

    /// Log the effective configuration with secrets redacted.
    pub fn dump_config(&self) {
        let config = self.channel.config();
        let api_key = config.api_key.as_ref().map_or("<none>", |_| "[REDACTED]");
        info!(
            resource_id = %self.resource_id,
            endpoint = config.endpoint.as_deref().unwrap_or("<none>"),
            device_id = config.device_id.as_deref().unwrap_or("<none>"),
            api_key,
            timeout_ms = self.card_timeout.as_millis() as u64,
            "Card transaction engine configuration"
        );
    }

    pub fn state(&self) -> CardState {
        self.machine.current_state()
    }

    pub fn state_machine(&self) -> &CardStateMachine {
        &self.machine
    }

    /// Last observed occupancy of the resource.
    pub fn resource_in_use(&self) -> bool {
        self.resource_in_use
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn current_uid(&self) -> Option<&CardUid> {
        self.current_uid.as_ref()
    }

    pub fn card_timeout(&self) -> Duration {
        self.card_timeout
    }

    pub fn channel(&self) -> &RemoteRequestChannel<T> {
        &self.channel
    }
}

/// Collects the engine's collaborators.
///
/// # Examples
///
/// ```
/// use attraccess_engine::{CardState, CardTransactionEngine};
/// use attraccess_hardware::mock::{MockButton, MockCardReader, MockLed};
/// use attraccess_network::mock::MockTransport;
/// use attraccess_network::{ChannelConfig, RemoteRequestChannel, ResourceStatus};
/// use tokio::sync::watch;
///
/// let (reader, _cards) = MockCardReader::new();
/// let (led, _led) = MockLed::new();
/// let (button, _button) = MockButton::new();
/// let (transport, _http) = MockTransport::new();
/// let (_status_tx, status_rx) = watch::channel(ResourceStatus::default());
///
/// let engine = CardTransactionEngine::builder()
///     .reader(reader)
///     .led(led)
///     .button(button)
///     .channel(RemoteRequestChannel::new(ChannelConfig::default(), transport))
///     .resource_status(status_rx)
///     .resource_id("7".parse().unwrap())
///     .build()
///     .unwrap();
///
/// assert_eq!(engine.state(), CardState::Idle);
/// ```
pub struct EngineBuilder<R, L, B, T> {
    reader: Option<R>,
    led: Option<L>,
    button: Option<B>,
    channel: Option<RemoteRequestChannel<T>>,
    resource_status: Option<watch::Receiver<ResourceStatus>>,
    resource_id: Option<ResourceId>,
    card_timeout: Duration,
}

impl<R, L, B, T> Default for EngineBuilder<R, L, B, T> {
    fn default() -> Self {
        Self {
            reader: None,
            led: None,
            button: None,
            channel: None,
            resource_status: None,
            resource_id: None,
            card_timeout: Duration::from_millis(DEFAULT_CARD_TIMEOUT_MS),
        }
    }
}

impl<R, L, B, T> EngineBuilder<R, L, B, T>
where
    R: CardReader,
    L: StatusLed,
    B: Button,
    T: HttpTransport,
{
    pub fn reader(mut self, reader: R) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn led(mut self, led: L) -> Self {
        self.led = Some(led);
        self
    }

    pub fn button(mut self, button: B) -> Self {
        self.button = Some(button);
        self
    }

    pub fn channel(mut self, channel: RemoteRequestChannel<T>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Status snapshots of the resource this reader controls.
    pub fn resource_status(mut self, status: watch::Receiver<ResourceStatus>) -> Self {
        self.resource_status = Some(status);
        self
    }

    pub fn resource_id(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Time allowed between card detection and the verdict.
    pub fn card_timeout(mut self, timeout: Duration) -> Self {
        self.card_timeout = timeout;
        self
    }

    /// Assemble the engine in `Idle` with the LED off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCollaborator`] if a device, the channel or
    /// the resource status source was not provided, and
    /// [`Error::MissingConfig`] without a resource id.
    pub fn build(self) -> Result<CardTransactionEngine<R, L, B, T>> {
        let missing = |name: &str| Error::MissingCollaborator(name.to_string());

        let resource_status = self.resource_status.ok_or_else(|| missing("resource status"))?;
        let reader = self.reader.ok_or_else(|| missing("card reader"))?;
        let mut led = self.led.ok_or_else(|| missing("status LED"))?;
        let button = self.button.ok_or_else(|| missing("button"))?;
        let channel = self.channel.ok_or_else(|| missing("request channel"))?;
        let resource_id = self
            .resource_id
            .ok_or_else(|| Error::MissingConfig("resource_id".to_string()))?;

        set_led(&mut led, false);
        let resource_in_use = resource_status.borrow().in_use;

        Ok(CardTransactionEngine {
            reader,
            led,
            button,
            channel,
            resource_status,
            resource_in_use,
            resource_id,
            machine: CardStateMachine::new(),
            card_timeout: self.card_timeout,
            last_card_read: Instant::now(),
            current_uid: None,
            button_was_pressed: false,
            card_read_subscribers: SubscriberList::new(),
            authorized_subscribers: SubscriberList::new(),
            denied_subscribers: SubscriberList::new(),
        })
    }
}
