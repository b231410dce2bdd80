//! Console-backed devices.
//!
//! The LED is rendered as log lines. The button, and the card field when
//! the mock driver is selected, are driven by commands typed on stdin:
//!
//! ```text
//! press                 click the button
//! card 04A1B2C3         present a card with that UID
//! reply 9100            script the card's answer to the next APDU
//! ```

use anyhow::{Context, bail};
use attraccess_core::CardUid;
use attraccess_hardware::StatusLed;
use attraccess_hardware::mock::{MockButtonHandle, MockCardReaderHandle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Status LED that logs its state changes.
#[derive(Debug, Default)]
pub struct ConsoleLed {
    on: bool,
}

impl StatusLed for ConsoleLed {
    fn set(&mut self, on: bool) -> attraccess_hardware::Result<()> {
        if on != self.on {
            debug!(on, "Status LED");
        }
        self.on = on;
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulatorCommand {
    Press,
    Card(CardUid),
    Reply(Vec<u8>),
}

fn parse_hex(text: &str) -> anyhow::Result<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        bail!("expected an even number of hex digits, got {text:?}");
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).with_context(|| format!("bad hex {text:?}")))
        .collect()
}

impl SimulatorCommand {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let argument = words.next();

        let command = match (verb.to_ascii_lowercase().as_str(), argument) {
            ("press", None) => Self::Press,
            ("card", Some(uid)) => Self::Card(uid.parse()?),
            ("reply", Some(hex)) => Self::Reply(parse_hex(hex)?),
            _ => bail!("unknown command {line:?} (try: press, card <hex>, reply <hex>)"),
        };
        Ok(Some(command))
    }
}

/// Feed commands read from `input` to the simulated devices until the
/// input ends.
pub async fn run_simulator<I>(input: I, button: MockButtonHandle, cards: Option<MockCardReaderHandle>)
where
    I: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Simulator input failed");
                break;
            }
        };

        let command = match SimulatorCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("{e:#}");
                continue;
            }
        };

        match (command, &cards) {
            (SimulatorCommand::Press, _) => {
                info!("Simulated button press");
                button.click();
            }
            (SimulatorCommand::Card(uid), Some(cards)) => {
                info!(uid = %uid, "Simulated card presented");
                cards.present_card(uid);
            }
            (SimulatorCommand::Reply(bytes), Some(cards)) => {
                debug!(len = bytes.len(), "Simulated card reply queued");
                cards.push_response(bytes);
            }
            (_, None) => warn!("Card commands need the mock reader driver"),
        }
    }
    info!("Simulator input closed");
}
