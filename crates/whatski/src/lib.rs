//! A single-page chat that forwards questions to a hosted ski advisor
//! assistant and shows its replies.
//!
//! The crate includes the `whatski` server binary. You can also use it as a
//! library to mount the chat router into your own server, with any
//! [`AssistantProvider`](whatski_core::model::AssistantProvider).

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod page;
mod server;
mod sessions;

pub use config::{Config, ConfigError};
pub use server::{AppState, SESSION_COOKIE, create_router};
pub use sessions::SessionStore;

/// Re-exports of [`whatski_core`] crate.
pub mod core {
    pub use whatski_core::*;
}
