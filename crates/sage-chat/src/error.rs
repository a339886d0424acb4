//! Error types for sage-chat

use thiserror::Error;

/// Result type alias using sage-chat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a chat round trip
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the endpoint client
    #[error(transparent)]
    Ai(#[from] sage_ai::Error),

    /// The stream ended without any assistant output
    #[error("Empty response from model")]
    EmptyResponse,

    /// The controller has been torn down
    #[error("Chat controller has been disposed")]
    Disposed,

    /// A system turn was added after the conversation started
    #[error("System turn must be the first turn of the conversation")]
    SystemTurnOutOfOrder,
}

impl Error {
    /// Check if the automatic retry policy should try again
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Ai(e) => e.is_retryable(),
            Error::EmptyResponse => true,
            Error::Disposed | Error::SystemTurnOutOfOrder => false,
        }
    }

    /// Whether this error came from an explicit abort
    pub fn is_aborted(&self) -> bool {
        matches!(self, Error::Ai(sage_ai::Error::Aborted))
    }
}
