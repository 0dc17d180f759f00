//! A local scripted assistant for testing purpose.

mod preset;

use std::collections::{HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard};

use whatski_model::{
    AssistantProvider, AssistantProviderError, ErrorKind, MessageId,
    MessageQuery, MessageRole, Run, RunId, RunRequest, RunStatus, SortOrder,
    ThreadId, ThreadMessage,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    fn new(message: &'static str, kind: ErrorKind) -> Self {
        Self { message, kind }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl AssistantProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// How many times each provider operation has been called.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CallCounts {
    pub create_thread: usize,
    pub add_user_message: usize,
    pub create_run: usize,
    pub retrieve_run: usize,
    pub cancel_run: usize,
    pub list_messages: usize,
}

struct RunState {
    thread: ThreadId,
    preset: PresetRun,
    polls: usize,
    failures_left: u64,
    last_status: RunStatus,
    replied: bool,
}

impl RunState {
    #[inline]
    fn snapshot(&self, id: &RunId) -> Run {
        Run {
            id: id.clone(),
            status: self.last_status,
            last_error: (self.last_status == RunStatus::Failed)
                .then(|| "server_error: preset failure".to_owned()),
        }
    }
}

#[derive(Default)]
struct State {
    script: VecDeque<PresetRun>,
    threads: HashMap<ThreadId, Vec<ThreadMessage>>,
    runs: HashMap<RunId, RunState>,
    next_id: u64,
    calls: CallCounts,
    unreachable: bool,
}

impl State {
    #[inline]
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}:{}", self.next_id)
    }

    fn has_active_run(&self, thread: &ThreadId) -> bool {
        self.runs
            .values()
            .any(|run| &run.thread == thread && !run.last_status.is_terminal())
    }

    fn check_reachable(&self) -> Result<(), Error> {
        if self.unreachable {
            return Err(Error::new("service unreachable", ErrorKind::Network));
        }
        Ok(())
    }

    fn retrieve_run(&mut self, thread: &ThreadId, id: &RunId) -> Result<Run, Error> {
        self.check_reachable()?;
        let Some(run) = self.runs.get_mut(id) else {
            return Err(Error::new("no such run", ErrorKind::NotFound));
        };
        if &run.thread != thread {
            return Err(Error::new("run belongs to another thread", ErrorKind::NotFound));
        }
        if run.failures_left > 0 {
            run.failures_left -= 1;
            return Err(Error::new("preset poll failure", ErrorKind::Network));
        }
        if run.preset.rejects_polls && !run.last_status.is_terminal() {
            return Err(Error::new(
                "preset poll rejection",
                ErrorKind::InvalidResponse,
            ));
        }
        if run.last_status.is_terminal() {
            return Ok(run.snapshot(id));
        }

        let statuses = &run.preset.statuses;
        run.last_status = match statuses.len() {
            0 => RunStatus::Completed,
            len => statuses[run.polls.min(len - 1)],
        };
        run.polls += 1;

        let mut new_messages = vec![];
        if run.last_status == RunStatus::Completed && !run.replied {
            run.replied = true;
            new_messages = run.preset.replies.clone();
        }
        let run = run.snapshot(id);
        for text in new_messages {
            let id = MessageId::new(self.next_id("msg"));
            self.threads.entry(thread.clone()).or_default().push(ThreadMessage {
                id,
                role: MessageRole::Assistant,
                text,
            });
        }
        Ok(run)
    }
}

/// A local scripted assistant for testing purpose.
///
/// Before starting runs, you need to setup the script, which is how each
/// run should behave. Every created run takes the next preset from the
/// script; if there are no presets left, creating the run fails.
///
/// Like the real service, the provider refuses to add messages to a
/// thread while one of its runs is still active.
///
/// # Note
///
/// This type is not optimized for production use. You should only use it
/// for testing.
#[derive(Clone, Default)]
pub struct TestAssistantProvider {
    state: Arc<Mutex<State>>,
}

impl TestAssistantProvider {
    #[inline]
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Appends a preset run to the script.
    #[inline]
    pub fn add_run(&self, preset: PresetRun) {
        self.state().script.push_back(preset);
    }

    /// Makes every following call fail with a network error, or stop
    /// failing.
    #[inline]
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Returns the call counts so far.
    #[inline]
    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    /// Returns all messages of a thread, oldest first.
    #[inline]
    pub fn messages(&self, thread: &ThreadId) -> Vec<ThreadMessage> {
        self.state().threads.get(thread).cloned().unwrap_or_default()
    }
}

impl AssistantProvider for TestAssistantProvider {
    type Error = crate::Error;

    fn create_thread(
        &self,
    ) -> impl Future<Output = Result<ThreadId, Self::Error>> + Send + 'static
    {
        let mut state = self.state();
        state.calls.create_thread += 1;
        let result = state.check_reachable().map(|_| {
            let id = ThreadId::new(state.next_id("thread"));
            state.threads.insert(id.clone(), vec![]);
            id
        });
        ready(result)
    }

    fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> impl Future<Output = Result<MessageId, Self::Error>> + Send + 'static
    {
        let mut state = self.state();
        state.calls.add_user_message += 1;
        let result = 'blk: {
            if let Err(err) = state.check_reachable() {
                break 'blk Err(err);
            }
            if !state.threads.contains_key(thread) {
                break 'blk Err(Error::new("no such thread", ErrorKind::NotFound));
            }
            if state.has_active_run(thread) {
                break 'blk Err(Error::new(
                    "thread has an active run",
                    ErrorKind::Other,
                ));
            }
            let id = MessageId::new(state.next_id("msg"));
            if let Some(messages) = state.threads.get_mut(thread) {
                messages.push(ThreadMessage {
                    id: id.clone(),
                    role: MessageRole::User,
                    text: content.to_owned(),
                });
            }
            Ok(id)
        };
        ready(result)
    }

    fn create_run(
        &self,
        thread: &ThreadId,
        _req: &RunRequest,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let mut state = self.state();
        state.calls.create_run += 1;
        let result = 'blk: {
            if let Err(err) = state.check_reachable() {
                break 'blk Err(err);
            }
            if !state.threads.contains_key(thread) {
                break 'blk Err(Error::new("no such thread", ErrorKind::NotFound));
            }
            let Some(preset) = state.script.pop_front() else {
                break 'blk Err(Error::new("no preset run left", ErrorKind::Other));
            };
            let id = RunId::new(state.next_id("run"));
            let run = RunState {
                thread: thread.clone(),
                failures_left: preset.failures.unwrap_or(0),
                preset,
                polls: 0,
                last_status: RunStatus::Queued,
                replied: false,
            };
            let snapshot = run.snapshot(&id);
            state.runs.insert(id, run);
            Ok(snapshot)
        };
        ready(result)
    }

    fn retrieve_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let mut state = self.state();
        state.calls.retrieve_run += 1;
        ready(state.retrieve_run(thread, run))
    }

    fn cancel_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let mut state = self.state();
        state.calls.cancel_run += 1;
        let result = 'blk: {
            if let Err(err) = state.check_reachable() {
                break 'blk Err(err);
            }
            let Some(run_state) = state
                .runs
                .get_mut(run)
                .filter(|run_state| &run_state.thread == thread)
            else {
                break 'blk Err(Error::new("no such run", ErrorKind::NotFound));
            };
            if run_state.last_status.is_terminal() {
                break 'blk Err(Error::new("run already ended", ErrorKind::Other));
            }
            run_state.last_status = RunStatus::Cancelled;
            Ok(run_state.snapshot(run))
        };
        ready(result)
    }

    fn list_messages(
        &self,
        thread: &ThreadId,
        query: &MessageQuery,
    ) -> impl Future<Output = Result<Vec<ThreadMessage>, Self::Error>>
    + Send
    + 'static {
        let mut state = self.state();
        state.calls.list_messages += 1;
        let result = 'blk: {
            if let Err(err) = state.check_reachable() {
                break 'blk Err(err);
            }
            let Some(messages) = state.threads.get(thread) else {
                break 'blk Err(Error::new("no such thread", ErrorKind::NotFound));
            };
            let limit = query.limit as usize;
            let listed = match query.order {
                SortOrder::Ascending => {
                    messages.iter().take(limit).cloned().collect()
                }
                SortOrder::Descending => {
                    messages.iter().rev().take(limit).cloned().collect()
                }
            };
            Ok(listed)
        };
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn poll_until_terminal(
        provider: &TestAssistantProvider,
        thread: &ThreadId,
        run: &RunId,
    ) -> Run {
        loop {
            let run = provider.retrieve_run(thread, run).await.unwrap();
            if run.status.is_terminal() {
                return run;
            }
        }
    }

    #[tokio::test]
    async fn test_completed_run() {
        let provider = TestAssistantProvider::default();
        provider.add_run(PresetRun::completed_with(["Hello, skier!"]));

        let thread = provider.create_thread().await.unwrap();
        provider.add_user_message(&thread, "Hi").await.unwrap();
        let run = provider
            .create_run(&thread, &RunRequest::default())
            .await
            .unwrap();
        assert_eq!(run.status, RunStatus::Queued);

        let run = poll_until_terminal(&provider, &thread, &run.id).await;
        assert_eq!(run.status, RunStatus::Completed);

        let messages = provider
            .list_messages(&thread, &MessageQuery::latest(5))
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Hello, skier!");
        assert_eq!(messages[1].text, "Hi");
        assert_eq!(provider.calls().retrieve_run, 2);
    }

    #[tokio::test]
    async fn test_failures_and_active_run() {
        let provider = TestAssistantProvider::default();
        provider.add_run(
            PresetRun::with_statuses([RunStatus::InProgress]).with_failures(1),
        );

        let thread = provider.create_thread().await.unwrap();
        provider.add_user_message(&thread, "Hi").await.unwrap();
        let run = provider
            .create_run(&thread, &RunRequest::default())
            .await
            .unwrap();

        let err = provider.retrieve_run(&thread, &run.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        let polled = provider.retrieve_run(&thread, &run.id).await.unwrap();
        assert_eq!(polled.status, RunStatus::InProgress);

        let err = provider.add_user_message(&thread, "Hey").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);

        let cancelled = provider.cancel_run(&thread, &run.id).await.unwrap();
        assert_eq!(cancelled.status, RunStatus::Cancelled);
        provider.add_user_message(&thread, "Hey").await.unwrap();
    }

    #[tokio::test]
    async fn test_script_exhausted() {
        let provider = TestAssistantProvider::default();
        let thread = provider.create_thread().await.unwrap();
        let err = provider
            .create_run(&thread, &RunRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let provider = TestAssistantProvider::default();
        provider.set_unreachable(true);
        let err = provider.create_thread().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(provider.calls().create_thread, 1);
    }
}
