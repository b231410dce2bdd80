//! Card transaction engine for the Attraccess NFC reader.
//!
//! - [`state`]: the card state machine and its transition history
//! - [`engine`]: [`CardTransactionEngine`], which reacts to the button, the
//!   card reader and server commands
//! - [`led`]: LED feedback patterns
//! - [`gateway`]: [`Gateway`], the composition root ticking the stream
//!   client and the engine together

pub mod engine;
pub mod gateway;
pub mod led;
pub mod state;

pub use engine::{CardTransactionEngine, EngineBuilder};
pub use gateway::{Devices, Gateway, GatewayConfig};
pub use led::BlinkPattern;
pub use state::{CardState, CardStateMachine, StateTransition};
