//! Card transaction state machine.
//!
//! # States
//!
//! - `Idle`: waiting for a button press
//! - `WaitForCard`: polling the reader for a card
//! - `CardDetected`: UID reported, waiting for server commands
//! - `ExecutingCommand`: relaying card operations for the server
//! - `Authorized` / `Denied`: verdict received, shown on the LED
//! - `Error`: a driver or API failure ended the transaction
//!
//! # Valid Transitions
//!
//! - Idle → WaitForCard → CardDetected → ExecutingCommand
//! - CardDetected / ExecutingCommand → Authorized / Denied / Error
//! - WaitForCard → Error
//! - any state → Idle via [`CardStateMachine::reset`]
//!
//! # Examples
//!
//! ```
//! use attraccess_engine::{CardState, CardStateMachine};
//!
//! let mut machine = CardStateMachine::new();
//! machine.transition_to(CardState::WaitForCard).unwrap();
//! machine.transition_to(CardState::CardDetected).unwrap();
//! assert!(machine.transition_to(CardState::WaitForCard).is_err());
//!
//! machine.reset();
//! assert_eq!(machine.current_state(), CardState::Idle);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use attraccess_core::constants::MAX_TRANSITION_HISTORY;
use attraccess_core::{Error, Result};
use serde::Serialize;
use tokio::time::Instant;

/// Phase of the card transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    Idle,
    WaitForCard,
    CardDetected,
    ExecutingCommand,
    Authorized,
    Denied,
    Error,
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardState::Idle => "Idle",
            CardState::WaitForCard => "WaitForCard",
            CardState::CardDetected => "CardDetected",
            CardState::ExecutingCommand => "ExecutingCommand",
            CardState::Authorized => "Authorized",
            CardState::Denied => "Denied",
            CardState::Error => "Error",
        };
        write!(f, "{name}")
    }
}

impl CardState {
    /// Check if `target` may follow this state.
    ///
    /// Returning to `Idle` is not listed here; it always goes through
    /// [`CardStateMachine::reset`].
    ///
    /// ```
    /// use attraccess_engine::CardState;
    ///
    /// assert!(CardState::Idle.can_transition_to(&CardState::WaitForCard));
    /// assert!(!CardState::Idle.can_transition_to(&CardState::Authorized));
    /// ```
    pub fn can_transition_to(&self, target: &CardState) -> bool {
        matches!(
            (self, target),
            (CardState::Idle, CardState::WaitForCard)
                | (CardState::WaitForCard, CardState::CardDetected | CardState::Error)
                | (
                    CardState::CardDetected | CardState::ExecutingCommand,
                    CardState::ExecutingCommand
                        | CardState::Authorized
                        | CardState::Denied
                        | CardState::Error
                )
        )
    }

    /// States in which server commands are dispatched.
    pub fn is_transaction_open(&self) -> bool {
        matches!(self, CardState::CardDetected | CardState::ExecutingCommand)
    }
}

/// A recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTransition {
    pub from: CardState,
    pub to: CardState,

    #[serde(skip)]
    pub timestamp: Instant,
}

impl StateTransition {
    pub fn new(from: CardState, to: CardState) -> Self {
        Self {
            from,
            to,
            timestamp: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Validated card state with a bounded transition history.
#[derive(Debug)]
pub struct CardStateMachine {
    current_state: CardState,
    state_entered_at: Instant,
    history: VecDeque<StateTransition>,
}

impl CardStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: CardState::Idle,
            state_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_TRANSITION_HISTORY),
        }
    }

    pub fn current_state(&self) -> CardState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.state_entered_at.elapsed()
    }

    /// Recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    pub fn last_transitions(&self, count: usize) -> Vec<StateTransition> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Move to `new_state` if the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] and leaves the machine
    /// unchanged if the transition is not allowed.
    pub fn transition_to(&mut self, new_state: CardState) -> Result<StateTransition> {
        if !self.current_state.can_transition_to(&new_state) {
            return Err(Error::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: new_state.to_string(),
            });
        }

        let transition = StateTransition::new(self.current_state, new_state);
        self.perform_state_change(new_state, transition.clone());
        Ok(transition)
    }

    /// Return to `Idle` from any state.
    pub fn reset(&mut self) -> StateTransition {
        let transition = StateTransition::new(self.current_state, CardState::Idle);
        self.perform_state_change(CardState::Idle, transition.clone());
        transition
    }

    fn perform_state_change(&mut self, new_state: CardState, transition: StateTransition) {
        self.current_state = new_state;
        self.state_entered_at = transition.timestamp;
        self.history.push_back(transition);
        if self.history.len() > MAX_TRANSITION_HISTORY {
            self.history.pop_front();
        }
    }
}

impl Default for CardStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
