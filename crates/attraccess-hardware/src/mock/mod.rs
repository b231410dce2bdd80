//! Mock device implementations for testing and development.
//!
//! This module provides simulated peripherals that can be controlled
//! programmatically through a handle, without requiring physical hardware.

pub mod button;
pub mod indicator;
pub mod led;
pub mod reader;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export commonly used types
pub use button::{MockButton, MockButtonHandle};
pub use indicator::RecordingIndicator;
pub use led::{MockLed, MockLedHandle};
pub use reader::{MockCardReader, MockCardReaderHandle};

/// Lock shared mock state, recovering it if a test thread panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
