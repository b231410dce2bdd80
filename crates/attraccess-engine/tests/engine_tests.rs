//! CardTransactionEngine scenarios against mock devices and a scripted API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use attraccess_core::{CardUid, Error};
use attraccess_engine::{CardState, CardTransactionEngine};
use attraccess_hardware::mock::{
    MockButton, MockButtonHandle, MockCardReader, MockCardReaderHandle, MockLed, MockLedHandle,
};
use attraccess_network::mock::{MockTransport, MockTransportHandle};
use attraccess_network::{ChannelConfig, RemoteRequestChannel, ResourceStatus};
use attraccess_protocol::{CommandType, Packet};
use bytes::{Bytes, BytesMut};
use tokio::sync::watch;

type Engine = CardTransactionEngine<MockCardReader, MockLed, MockButton, MockTransport>;

struct Harness {
    engine: Engine,
    cards: MockCardReaderHandle,
    led: MockLedHandle,
    button: MockButtonHandle,
    http: MockTransportHandle,
    status_tx: watch::Sender<ResourceStatus>,
}

fn harness() -> Harness {
    let (reader, cards) = MockCardReader::new();
    let (led, led_handle) = MockLed::new();
    let (button, button_handle) = MockButton::new();
    let (transport, http) = MockTransport::new();
    let (status_tx, status_rx) = watch::channel(ResourceStatus::default());

    let config = ChannelConfig::default().with_endpoint("http://api.local/api/desfire/proxy");
    let engine = CardTransactionEngine::builder()
        .reader(reader)
        .led(led)
        .button(button)
        .channel(RemoteRequestChannel::new(config, transport))
        .resource_status(status_rx)
        .resource_id("7".parse().unwrap())
        .build()
        .unwrap();

    Harness {
        engine,
        cards,
        led: led_handle,
        button: button_handle,
        http,
        status_tx,
    }
}

fn uid() -> CardUid {
    CardUid::new(vec![0x04, 0xA1, 0xB2, 0xC3]).unwrap()
}

/// Button press, then a card whose report the server answers with `reply`.
async fn card_detected_with(h: &mut Harness, reply: impl FnOnce(&MockTransportHandle)) {
    h.http.push_response(200, Vec::new());
    reply(&h.http);

    h.button.click();
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::WaitForCard);

    h.cards.present_card(uid());
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::CardDetected);
}

fn sent_types(h: &Harness) -> Vec<CommandType> {
    h.http
        .sent_packets()
        .iter()
        .map(|p| CommandType::from_code(p.cmd_type))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_starts_idle_with_led_off() {
    let mut h = harness();
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.led.history(), vec![false]);

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.http.request_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_button_press_waits_for_card() {
    let mut h = harness();

    h.button.click();
    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::WaitForCard);
    assert!(h.led.is_on());
    let packets = h.http.sent_packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].cmd_type, CommandType::ButtonEvent.code());
    assert_eq!(packets[0].data.as_ref(), b"7");
}

#[tokio::test(start_paused = true)]
async fn test_button_send_failure_blinks_and_stays_idle() {
    let mut h = harness();
    h.http.push_response(500, Vec::new());

    h.button.click();
    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(
        h.led.history(),
        vec![false, true, true, false, true, false, false]
    );
}

#[tokio::test(start_paused = true)]
async fn test_held_button_is_one_press() {
    let mut h = harness();
    h.http.push_response(500, Vec::new());
    h.http.push_response(500, Vec::new());

    h.button.press();
    h.engine.tick().await;
    h.engine.tick().await;
    assert_eq!(h.http.request_count(), 1);

    h.button.release();
    h.engine.tick().await;
    h.button.press();
    h.engine.tick().await;
    assert_eq!(h.http.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_button_ignored_outside_idle() {
    let mut h = harness();
    h.button.click();
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::WaitForCard);

    h.button.click();
    h.engine.tick().await;
    assert_eq!(h.http.request_count(), 1);
    assert_eq!(h.engine.state(), CardState::WaitForCard);
}

#[tokio::test(start_paused = true)]
async fn test_card_detected_notifies_and_reports() {
    let mut h = harness();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    h.engine
        .on_card_read(move |uid| sink.lock().unwrap().push(uid.to_string()));

    card_detected_with(&mut h, |_| {}).await;

    assert_eq!(*seen.lock().unwrap(), vec!["04A1B2C3".to_string()]);
    assert_eq!(h.engine.current_uid(), Some(&uid()));
    let packets = h.http.sent_packets();
    assert_eq!(packets[1].cmd_type, CommandType::CardDetected.code());
    assert_eq!(packets[1].data.as_ref(), b"04A1B2C3");
    assert_eq!(packets[1].cmd_id, 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_card_keeps_waiting() {
    let mut h = harness();
    h.button.click();
    h.engine.tick().await;

    h.cards.fail_next_detect("no response from reader");
    h.engine.tick().await;
    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::WaitForCard);
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_card_already_in_field_at_button_press() {
    let mut h = harness();
    h.cards.present_card(uid());

    h.button.click();
    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::CardDetected);
    assert_eq!(h.engine.current_uid(), Some(&uid()));
    assert_eq!(
        sent_types(&h),
        vec![CommandType::ButtonEvent, CommandType::CardDetected]
    );
}

#[tokio::test(start_paused = true)]
async fn test_card_report_failure_goes_to_error_then_idle() {
    let mut h = harness();
    h.http.push_response(200, Vec::new());
    h.http.push_response(503, Vec::new());

    h.button.click();
    h.engine.tick().await;
    h.cards.present_card(uid());
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Error);

    h.led.clear();
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.led.on_count(), 5);
    assert!(!h.led.is_on());
    assert!(h.engine.current_uid().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_card_report_timeout_goes_to_error() {
    let mut h = harness();
    h.button.click();
    h.engine.tick().await;

    h.http.set_delay(Some(Duration::from_secs(10)));
    h.cards.present_card(uid());
    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::Error);
    assert!(!h.engine.channel().is_awaiting());
}

#[tokio::test(start_paused = true)]
async fn test_request_gate_held_past_timeout_goes_to_error() {
    let mut h = harness();
    card_detected_with(&mut h, |_| {}).await;
    assert!(h.engine.channel().is_awaiting());

    tokio::time::advance(Duration::from_millis(5_001)).await;
    h.led.clear();
    h.engine.tick().await;

    assert!(!h.engine.channel().is_awaiting());
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.led.on_count(), 5);
    let states: Vec<CardState> = h
        .engine
        .state_machine()
        .history()
        .iter()
        .map(|t| t.to)
        .collect();
    assert_eq!(
        states,
        vec![
            CardState::WaitForCard,
            CardState::CardDetected,
            CardState::Error,
            CardState::Idle
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_request_gate_released_within_timeout() {
    let mut h = harness();
    card_detected_with(&mut h, |http| http.push_command(CommandType::AuthResult, &[0x01])).await;

    tokio::time::advance(Duration::from_millis(5_000)).await;
    h.engine.tick().await;

    assert!(!h.engine.channel().is_awaiting());
    assert_eq!(h.engine.state(), CardState::Authorized);
}

#[tokio::test(start_paused = true)]
async fn test_authorized_flow() {
    let mut h = harness();
    let authorized = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&authorized);
    h.engine.on_authorized(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    card_detected_with(&mut h, |http| {
        http.push_command(CommandType::CardOperation, &[0x01, 0x02, 0x90, 0x60, 0xEE]);
        http.push_command(CommandType::AuthResult, &[0x01]);
    })
    .await;
    h.cards.push_response(vec![0x91, 0xAF]);

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::ExecutingCommand);
    assert_eq!(h.cards.sent_apdus()[0].as_ref(), &[0x90, 0x60]);
    let reply = &h.http.sent_packets()[2];
    assert_eq!(reply.cmd_type, CommandType::CardOperation.code());
    assert_eq!(reply.data.as_ref(), &[0x91, 0xAF]);

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Authorized);
    assert_eq!(authorized.load(Ordering::SeqCst), 1);

    h.led.clear();
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.led.history(), vec![true, false, true, false, true, false, false]);

    assert_eq!(
        sent_types(&h),
        vec![
            CommandType::ButtonEvent,
            CommandType::CardDetected,
            CommandType::CardOperation
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_denied_flow() {
    let mut h = harness();
    let denied = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&denied);
    h.engine.on_denied(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    card_detected_with(&mut h, |http| http.push_command(CommandType::AuthResult, &[0x00])).await;

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Denied);
    assert_eq!(denied.load(Ordering::SeqCst), 1);

    h.led.clear();
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.led.on_count(), 5);
    assert!(!h.led.is_on());
}

#[tokio::test(start_paused = true)]
async fn test_card_timeout_resets_to_idle() {
    let mut h = harness();
    card_detected_with(&mut h, |_| {}).await;
    assert!(h.led.is_on());
    h.engine.tick().await;
    assert!(!h.engine.channel().is_awaiting());

    tokio::time::advance(Duration::from_millis(30_000)).await;
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::CardDetected);

    tokio::time::advance(Duration::from_millis(1)).await;
    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Idle);
    assert!(!h.led.is_on());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_card_operation_dropped() {
    let mut h = harness();
    card_detected_with(&mut h, |http| {
        http.push_command(CommandType::CardOperation, &[0x01, 0x05, 0x00]);
    })
    .await;

    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::CardDetected);
    assert!(h.cards.sent_apdus().is_empty());
    assert_eq!(h.http.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_card_operation_dropped() {
    let mut h = harness();
    card_detected_with(&mut h, |http| {
        http.push_command(CommandType::CardOperation, &[0x04, 0x01, 0x00]);
    })
    .await;

    h.engine.tick().await;

    assert_eq!(h.engine.state(), CardState::CardDetected);
    assert!(h.cards.sent_apdus().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transceive_failure_goes_to_error() {
    let mut h = harness();
    card_detected_with(&mut h, |http| {
        http.push_command(CommandType::CardOperation, &[0x01, 0x01, 0x60]);
    })
    .await;
    h.cards.push_failure("card removed");

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Error);
    assert_eq!(h.http.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_card_response_send_failure_goes_to_error() {
    let mut h = harness();
    card_detected_with(&mut h, |http| {
        http.push_command(CommandType::CardOperation, &[0x01, 0x01, 0x60]);
        http.push_response(502, Vec::new());
    })
    .await;
    h.cards.push_response(vec![0x91, 0x00]);

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Error);
}

#[tokio::test(start_paused = true)]
async fn test_resource_activate_and_deactivate_drive_led() {
    let mut h = harness();
    let mut body = BytesMut::new();
    Packet::new(1, CommandType::ResourceDeactivate.code(), Bytes::new(), 0)
        .encode(&mut body)
        .unwrap();
    Packet::new(2, CommandType::ResourceActivate.code(), Bytes::new(), 0)
        .encode(&mut body)
        .unwrap();
    let body = body.freeze();
    card_detected_with(&mut h, move |http| http.push_response(200, body)).await;

    h.engine.tick().await;
    assert!(!h.led.is_on());
    h.engine.tick().await;
    assert!(h.led.is_on());
    assert_eq!(h.engine.state(), CardState::CardDetected);
}

#[tokio::test(start_paused = true)]
async fn test_ignored_commands_keep_state() {
    let mut h = harness();
    let mut body = BytesMut::new();
    let ignored: [(u16, CommandType, &[u8]); 4] = [
        (1, CommandType::AuthResult, &[]),
        (2, CommandType::StatusUpdate, &[0x01]),
        (3, CommandType::DeviceAuth, &[]),
        (4, CommandType::Unknown(0x77), &[]),
    ];
    for (id, cmd_type, data) in ignored {
        Packet::new(id, cmd_type.code(), Bytes::copy_from_slice(data), 0)
            .encode(&mut body)
            .unwrap();
    }
    let body = body.freeze();
    card_detected_with(&mut h, move |http| http.push_response(200, body)).await;

    for _ in 0..4 {
        h.engine.tick().await;
        assert_eq!(h.engine.state(), CardState::CardDetected);
    }
    assert_eq!(h.engine.channel().queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_queued_commands() {
    let mut h = harness();
    let mut body = BytesMut::new();
    Packet::new(1, CommandType::AuthResult.code(), Bytes::from_static(&[0x01]), 0)
        .encode(&mut body)
        .unwrap();
    Packet::new(2, CommandType::ResourceActivate.code(), Bytes::new(), 0)
        .encode(&mut body)
        .unwrap();
    let body = body.freeze();
    card_detected_with(&mut h, move |http| http.push_response(200, body)).await;

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Authorized);
    assert_eq!(h.engine.channel().queued(), 1);

    h.engine.tick().await;
    assert_eq!(h.engine.state(), CardState::Idle);
    assert_eq!(h.engine.channel().queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resource_status_observed() {
    let mut h = harness();
    assert!(!h.engine.resource_in_use());

    h.status_tx.send_replace(ResourceStatus {
        in_use: true,
        last_event_type: Some("resource.usage.started".into()),
    });
    h.engine.tick().await;
    assert!(h.engine.resource_in_use());
}

#[tokio::test(start_paused = true)]
async fn test_transition_history_recorded() {
    let mut h = harness();
    card_detected_with(&mut h, |http| http.push_command(CommandType::AuthResult, &[0x01])).await;
    h.engine.tick().await;
    h.engine.tick().await;

    let states: Vec<CardState> = h
        .engine
        .state_machine()
        .history()
        .iter()
        .map(|t| t.to)
        .collect();
    assert_eq!(
        states,
        vec![
            CardState::WaitForCard,
            CardState::CardDetected,
            CardState::Authorized,
            CardState::Idle
        ]
    );
}

#[test]
fn test_builder_requires_resource_status() {
    let (reader, _cards) = MockCardReader::new();
    let (led, _led) = MockLed::new();
    let (button, _button) = MockButton::new();
    let (transport, _http) = MockTransport::new();

    let result: Result<Engine, Error> = CardTransactionEngine::builder()
        .reader(reader)
        .led(led)
        .button(button)
        .channel(RemoteRequestChannel::new(ChannelConfig::default(), transport))
        .resource_id("7".parse().unwrap())
        .build();

    assert!(matches!(result, Err(Error::MissingCollaborator(name)) if name == "resource status"));
}

#[test]
fn test_builder_requires_resource_id() {
    let (reader, _cards) = MockCardReader::new();
    let (led, _led) = MockLed::new();
    let (button, _button) = MockButton::new();
    let (transport, _http) = MockTransport::new();
    let (_tx, rx) = watch::channel(ResourceStatus::default());

    let result: Result<Engine, Error> = CardTransactionEngine::builder()
        .reader(reader)
        .led(led)
        .button(button)
        .channel(RemoteRequestChannel::new(ChannelConfig::default(), transport))
        .resource_status(rx)
        .build();

    assert!(matches!(result, Err(Error::MissingConfig(_))));
}

#[tokio::test]
async fn test_init_reader_reports_info() {
    let mut h = harness();
    let info = h.engine.init_reader().await.unwrap();
    assert_eq!(info.name, "Mock NFC Reader");
}
