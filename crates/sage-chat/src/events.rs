//! Chat event types

use sage_ai::Turn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the controller is in the request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Sending,
    Streaming,
    Committing,
    Failed,
}

/// Events emitted for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Lifecycle transition
    StateChanged { state: LifecycleState },

    /// A request attempt is about to be issued (1 = first try)
    RequestStart { attempt: u32 },

    /// New markup arrived, to be appended at byte `offset` of the
    /// in-progress response. An offset of 0 starts a new attempt.
    Delta { markup: String, offset: usize },

    /// An assistant turn was committed to the conversation
    TurnCommitted { turn: Turn },

    /// A request failed; a failure notice has been appended
    Failed { message: String, will_retry: bool },

    /// An automatic retry will start after `delay`
    RetryScheduled { retry: u32, delay: Duration },

    /// The conversation was cleared
    Cleared,
}

impl ChatEvent {
    /// Check if this event ends a send
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatEvent::TurnCommitted { .. }
                | ChatEvent::Failed {
                    will_retry: false,
                    ..
                }
        )
    }
}
