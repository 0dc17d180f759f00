use std::error::Error;
use std::fmt::{self, Display};
use std::time::Duration;

use whatski_model::RunStatus;

use crate::client::ClientError;

/// Shown when the run ends in any state other than `completed`.
pub const RUN_FAILED_REPLY: &str = "Error: Assistant response failed.";
/// Shown when the run does not end within the poll policy.
pub const TIMED_OUT_REPLY: &str = "Error: Assistant response timed out.";
/// Shown when the service cannot be talked to.
pub const UNREACHABLE_REPLY: &str =
    "Error: Could not reach the assistant service.";
/// Shown when the run completed without a new assistant message.
pub const NO_REPLY: &str = "Error: Assistant returned no new reply.";

/// Why a turn did not produce an assistant reply.
#[derive(Debug)]
pub enum TurnError {
    /// The conversation thread could not be created.
    CreateThread(ClientError),
    /// The user message could not be submitted.
    Submit(ClientError),
    /// The run could not be started.
    StartRun(ClientError),
    /// Polling the run failed with a non-transient error.
    Poll(ClientError),
    /// The latest messages could not be listed.
    FetchReply(ClientError),
    /// The run ended without completing.
    RunEnded {
        /// The terminal status of the run.
        status: RunStatus,
        /// The reason reported by the service, if any.
        reason: Option<String>,
    },
    /// The run was still going when the poll policy gave up.
    TimedOut {
        /// How many polls were made.
        attempts: u32,
        /// How long the executor waited.
        elapsed: Duration,
    },
    /// The run completed but no new assistant message was found.
    NoReply,
}

impl TurnError {
    /// Returns the text recorded in the transcript in place of a reply.
    pub fn placeholder(&self) -> &'static str {
        match self {
            TurnError::CreateThread(_)
            | TurnError::Submit(_)
            | TurnError::StartRun(_)
            | TurnError::Poll(_)
            | TurnError::FetchReply(_) => UNREACHABLE_REPLY,
            TurnError::RunEnded { .. } => RUN_FAILED_REPLY,
            TurnError::TimedOut { .. } => TIMED_OUT_REPLY,
            TurnError::NoReply => NO_REPLY,
        }
    }
}

impl Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::CreateThread(err) => {
                write!(f, "failed to create thread: {err}")
            }
            TurnError::Submit(err) => write!(f, "failed to submit message: {err}"),
            TurnError::StartRun(err) => write!(f, "failed to start run: {err}"),
            TurnError::Poll(err) => write!(f, "failed to poll run: {err}"),
            TurnError::FetchReply(err) => {
                write!(f, "failed to list messages: {err}")
            }
            TurnError::RunEnded { status, reason } => {
                write!(f, "run ended with status {status:?}")?;
                if let Some(reason) = reason {
                    write!(f, " ({reason})")?;
                }
                Ok(())
            }
            TurnError::TimedOut { attempts, elapsed } => write!(
                f,
                "run did not finish after {attempts} polls in {elapsed:?}"
            ),
            TurnError::NoReply => write!(f, "no new assistant message"),
        }
    }
}

impl Error for TurnError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TurnError::CreateThread(err)
            | TurnError::Submit(err)
            | TurnError::StartRun(err)
            | TurnError::Poll(err)
            | TurnError::FetchReply(err) => {
                let err: &(dyn Error + 'static) = &**err;
                Some(err)
            }
            _ => None,
        }
    }
}
