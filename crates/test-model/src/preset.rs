use serde::{Deserialize, Serialize};
use whatski_model::RunStatus;

/// The preset behavior of one run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetRun {
    /// Statuses reported by successive polls. The last one repeats
    /// forever; an empty list means the run completes on the first poll.
    pub statuses: Vec<RunStatus>,
    /// Assistant messages added to the thread, in order, once the run
    /// is observed as completed.
    pub replies: Vec<String>,
    /// If set, the first `failures` polls fail with a network error.
    pub failures: Option<u64>,
    /// If set, polls fail with a non-transient error while the run is
    /// active.
    #[serde(default)]
    pub rejects_polls: bool,
}

impl PresetRun {
    /// Creates a run that is in progress for one poll and then completes
    /// with the specified replies.
    #[inline]
    pub fn completed_with<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            statuses: vec![RunStatus::InProgress, RunStatus::Completed],
            replies: replies.into_iter().map(Into::into).collect(),
            failures: None,
            rejects_polls: false,
        }
    }

    /// Creates a run that reports the specified statuses and adds no
    /// replies.
    #[inline]
    pub fn with_statuses(statuses: impl Into<Vec<RunStatus>>) -> Self {
        Self {
            statuses: statuses.into(),
            replies: vec![],
            failures: None,
            rejects_polls: false,
        }
    }

    /// Sets the number of polls that fail before the run reports any
    /// status.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Makes polls of the active run fail with an invalid response.
    #[inline]
    pub fn rejecting_polls(mut self) -> Self {
        self.rejects_polls = true;
        self
    }
}
