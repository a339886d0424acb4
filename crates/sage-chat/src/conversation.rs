//! Conversation state: the ordered log of completed turns.

use sage_ai::{Role, Turn};

use crate::error::{Error, Result};

/// Append-only log of turns in chronological order.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. A system turn is only accepted as the very first turn.
    pub fn push(&mut self, turn: Turn) -> Result<()> {
        if turn.role == Role::System && !self.turns.is_empty() {
            return Err(Error::SystemTurnOutOfOrder);
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Remove everything, including the system turn
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Remove failure notices from the end of the log, returning how many
    pub fn pop_trailing_failures(&mut self) -> usize {
        let mut removed = 0;
        while self.turns.last().is_some_and(Turn::is_failure) {
            self.turns.pop();
            removed += 1;
        }
        removed
    }

    /// Remove the last turn if it is an unanswered user turn
    pub fn pop_trailing_user(&mut self) -> Option<Turn> {
        if self.turns.last()?.role == Role::User {
            self.turns.pop()
        } else {
            None
        }
    }

    /// Turns to send to the endpoint: everything except failure notices
    pub fn payload_messages(&self) -> Vec<Turn> {
        self.turns
            .iter()
            .filter(|t| !t.is_failure())
            .cloned()
            .collect()
    }
}
