//! An abstraction layer for hosted assistant services.
//!
//! A hosted assistant keeps the conversation on the server side: the
//! client creates a thread, appends user messages to it, starts a run
//! and polls the run until the service has produced a reply. This crate
//! establishes the types and the provider protocol for that workflow,
//! so that the rest of the application can talk to any compatible
//! service (or a scripted one in tests) without modification.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod run;
mod thread;

pub use error::*;
pub use provider::*;
pub use run::*;
pub use thread::*;
