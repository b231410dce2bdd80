//! Mock push-button.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::traits::Button;

/// Mock button driven from a handle.
///
/// The handle can hold the button down (`press`/`release`) or produce a
/// single-sample pulse (`click`).
#[derive(Debug)]
pub struct MockButton {
    state: Arc<ButtonState>,
}

#[derive(Debug, Default)]
struct ButtonState {
    held: AtomicBool,
    pulse: AtomicBool,
}

impl MockButton {
    pub fn new() -> (Self, MockButtonHandle) {
        let state = Arc::new(ButtonState::default());
        (
            Self {
                state: Arc::clone(&state),
            },
            MockButtonHandle { state },
        )
    }
}

impl Button for MockButton {
    fn is_pressed(&mut self) -> bool {
        let pulse = self.state.pulse.swap(false, Ordering::SeqCst);
        pulse || self.state.held.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct MockButtonHandle {
    state: Arc<ButtonState>,
}

impl MockButtonHandle {
    pub fn press(&self) {
        self.state.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.state.held.store(false, Ordering::SeqCst);
    }

    /// Report pressed for exactly one sample.
    pub fn click(&self) {
        self.state.pulse.store(true, Ordering::SeqCst);
    }
}
