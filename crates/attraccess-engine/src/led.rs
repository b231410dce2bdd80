//! LED blink patterns.

use std::time::Duration;

use attraccess_core::constants::{
    ERROR_BLINK_COUNT, ERROR_BLINK_MS, SEND_FAILURE_BLINK_COUNT, SEND_FAILURE_BLINK_MS,
    SUCCESS_BLINK_COUNT, SUCCESS_BLINK_MS,
};
use attraccess_hardware::StatusLed;
use tracing::warn;

/// `count` flashes of `period` on, separated by `period` off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub count: u8,
    pub period: Duration,
}

impl BlinkPattern {
    pub const SUCCESS: Self = Self::new(SUCCESS_BLINK_COUNT, SUCCESS_BLINK_MS);
    pub const ERROR: Self = Self::new(ERROR_BLINK_COUNT, ERROR_BLINK_MS);
    pub const SEND_FAILURE: Self = Self::new(SEND_FAILURE_BLINK_COUNT, SEND_FAILURE_BLINK_MS);

    pub const fn new(count: u8, period_ms: u64) -> Self {
        Self {
            count,
            period: Duration::from_millis(period_ms),
        }
    }

    /// Time the pattern occupies; there is no pause after the last flash.
    pub fn duration(&self) -> Duration {
        match self.count {
            0 => Duration::ZERO,
            n => self.period * (2 * u32::from(n) - 1),
        }
    }
}

/// Write `on` to the LED, logging a failed write.
pub fn set_led<L: StatusLed>(led: &mut L, on: bool) {
    if let Err(e) = led.set(on) {
        warn!(on, error = %e, "LED write failed");
    }
}

/// Play `pattern` on the LED. The LED is left off.
pub async fn blink<L: StatusLed>(led: &mut L, pattern: BlinkPattern) {
    for i in 0..pattern.count {
        set_led(led, true);
        tokio::time::sleep(pattern.period).await;
        set_led(led, false);
        if i + 1 < pattern.count {
            tokio::time::sleep(pattern.period).await;
        }
    }
}
