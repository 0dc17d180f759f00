//! Core logic including the transcript, the conversation session and the
//! turn executor.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod client;
mod session;
pub mod transcript;
pub mod turn;

pub use client::{AssistantClient, ClientError};
pub use session::{ChatSession, ChatSessionBuilder};
pub use transcript::{Message, Transcript};
pub use turn::{PollPolicy, TurnError, TurnExecutor, TurnOutcome};

/// Re-exports of [`whatski_model`] crate.
pub mod model {
    pub use whatski_model::*;
}
