//! sage-chat: conversation state and request lifecycle
//!
//! This crate owns the conversation log and drives one streamed request at
//! a time through send, stream, commit or fail, with automatic and manual
//! retry.

pub mod controller;
pub mod conversation;
pub mod error;
pub mod events;
pub mod handle;
pub mod retry;
pub mod transport;

pub use controller::{ChatConfig, ChatController, FAILURE_NOTICE, SendOutcome};
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use events::{ChatEvent, LifecycleState};
pub use handle::ChatHandle;
pub use retry::{RetryPolicy, RetryState};
pub use transport::{HttpTransport, Transport};
