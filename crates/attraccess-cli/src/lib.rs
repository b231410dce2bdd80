//! Configuration and device wiring for the `attraccess-reader` binary.

pub mod config;
pub mod console;

pub use config::{AppConfig, ReaderDriver};
pub use console::{ConsoleLed, SimulatorCommand};
