use serde::{Deserialize, Serialize};

use crate::thread::define_id;

define_id! {
    /// Opaque identifier of a run.
    RunId
}

/// The lifecycle state of a run, as reported by the service.
///
/// Runs start as `Queued`, move to `InProgress`, and end in one of the
/// terminal states. The client only observes these transitions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting to be picked up.
    Queued,
    /// Being processed.
    InProgress,
    /// Waiting for the client to submit tool outputs.
    RequiresAction,
    /// A cancellation was requested but has not taken effect.
    Cancelling,
    /// Cancelled.
    Cancelled,
    /// Failed on the service side.
    Failed,
    /// Finished successfully.
    Completed,
    /// Ended before producing a complete answer.
    Incomplete,
    /// Not finished in the time the service allows.
    Expired,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Returns `true` if the run will not change any more by itself.
    ///
    /// `RequiresAction` counts as terminal: it only moves on when the
    /// client submits tool outputs.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            RunStatus::Queued
                | RunStatus::InProgress
                | RunStatus::Cancelling
                | RunStatus::Unknown
        )
    }

    /// Returns `true` if the run finished successfully.
    #[inline]
    pub fn is_success(self) -> bool {
        self == RunStatus::Completed
    }
}

/// A processing cycle of the assistant on a thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Run {
    /// The identifier of the run.
    pub id: RunId,
    /// The current status.
    pub status: RunStatus,
    /// The reason reported by the service when the run failed.
    pub last_error: Option<String>,
}

/// A tool capability the assistant may use during a run.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AssistantTool {
    /// Retrieval over the files attached to the assistant.
    FileSearch,
    /// Sandboxed code execution.
    CodeInterpreter,
}

/// A request to start a run.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunRequest {
    /// Tools enabled for this run.
    pub tools: Vec<AssistantTool>,
}

impl Default for RunRequest {
    #[inline]
    fn default() -> Self {
        Self {
            tools: vec![AssistantTool::FileSearch],
        }
    }
}
