//! sage-ai: streaming chat completion client
//!
//! Wire types, validated endpoint configuration, the incremental stream
//! decoder and the fragment formatter that turns model output into markup.

pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod format;
pub mod types;

pub use client::{ByteStream, ChatClient, DeltaStream};
pub use config::ClientConfig;
pub use decoder::{Delta, StreamDecoder};
pub use error::{Error, Result};
pub use types::*;
