//! Session state machine: tracks where the onboarding conversation is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Maximum number of transitions kept in the history.
const MAX_TRANSITIONS: usize = 200;

/// States of one onboarding session.
///
/// One turn runs AwaitingAnswer → Validating → Persisting → Advancing and
/// back to AwaitingAnswer, until Advancing finds nothing left and moves to
/// Completed and then Finalizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Greeting,
    AwaitingAnswer,
    Validating,
    Persisting,
    Advancing,
    Completed,
    Finalizing,
}

impl SessionState {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Initializing, Greeting)
                | (Greeting, Advancing)
                | (AwaitingAnswer, Validating)
                | (Validating, AwaitingAnswer)
                | (Validating, Persisting)
                | (Persisting, Advancing)
                | (Advancing, AwaitingAnswer)
                | (Advancing, Completed)
                | (Completed, Finalizing)
                // Skip, or delete an earlier answer.
                | (AwaitingAnswer, Advancing)
                | (Completed, Advancing)
                | (Finalizing, Advancing)
        )
    }

    /// Whether this state is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalizing)
    }

    /// Whether the session is parked waiting for user input.
    pub fn is_idle(&self) -> bool {
        matches!(
            self,
            Self::AwaitingAnswer | Self::Completed | Self::Finalizing
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Initializing
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Greeting => "greeting",
            Self::AwaitingAnswer => "awaiting_answer",
            Self::Validating => "validating",
            Self::Persisting => "persisting",
            Self::Advancing => "advancing",
            Self::Completed => "completed",
            Self::Finalizing => "finalizing",
        };
        write!(f, "{s}")
    }
}

/// A state transition event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Current state plus a bounded transition history.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMachine {
    pub state: SessionState,
    pub transitions: Vec<StateTransition>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition to a new state.
    pub fn transition_to(
        &mut self,
        new_state: SessionState,
        reason: Option<String>,
    ) -> Result<(), SessionError> {
        if !self.state.can_transition_to(new_state) {
            return Err(SessionError::InvalidTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        tracing::debug!(from = %self.state, to = %new_state, "Session transition");
        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });
        if self.transitions.len() > MAX_TRANSITIONS {
            let drain_count = self.transitions.len() - MAX_TRANSITIONS;
            self.transitions.drain(..drain_count);
        }

        self.state = new_state;
        if new_state == SessionState::Completed && self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }
}
