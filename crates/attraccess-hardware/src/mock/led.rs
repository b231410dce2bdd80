//! Mock status LED recording every state change.

use std::sync::{Arc, Mutex};

use super::lock;
use crate::error::Result;
use crate::traits::StatusLed;

/// Mock LED for testing.
#[derive(Debug)]
pub struct MockLed {
    on: bool,
    log: Arc<Mutex<Vec<bool>>>,
}

impl MockLed {
    pub fn new() -> (Self, MockLedHandle) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                on: false,
                log: Arc::clone(&log),
            },
            MockLedHandle { log },
        )
    }
}

impl StatusLed for MockLed {
    fn set(&mut self, on: bool) -> Result<()> {
        self.on = on;
        lock(&self.log).push(on);
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Read-only view of a mock LED's history.
#[derive(Debug, Clone)]
pub struct MockLedHandle {
    log: Arc<Mutex<Vec<bool>>>,
}

impl MockLedHandle {
    /// Every state written, oldest first.
    pub fn history(&self) -> Vec<bool> {
        lock(&self.log).clone()
    }

    /// Last state written, `false` if never set.
    pub fn is_on(&self) -> bool {
        lock(&self.log).last().copied().unwrap_or(false)
    }

    /// Number of times the LED was switched on.
    pub fn on_count(&self) -> usize {
        lock(&self.log).iter().filter(|on| **on).count()
    }

    pub fn clear(&self) {
        lock(&self.log).clear();
    }
}
