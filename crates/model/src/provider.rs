use std::error::Error;

use crate::error::ErrorKind;
use crate::run::{Run, RunId, RunRequest};
use crate::thread::{MessageId, MessageQuery, ThreadId, ThreadMessage};

/// The error type for an assistant provider.
pub trait AssistantProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a hosted assistant service.
///
/// Once the provider is created, it should behave like a stateless object.
/// All conversation state lives on the service side and is addressed by
/// the identifiers the service hands out. Every returned future must be
/// independent of `self` and of the borrowed arguments, so that callers
/// can move it onto another task.
pub trait AssistantProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: AssistantProviderError;

    /// Creates a new, empty conversation thread.
    fn create_thread(
        &self,
    ) -> impl Future<Output = Result<ThreadId, Self::Error>> + Send + 'static;

    /// Appends a user message to the thread and returns its id.
    fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> impl Future<Output = Result<MessageId, Self::Error>> + Send + 'static;

    /// Starts a run that lets the assistant process the thread.
    fn create_run(
        &self,
        thread: &ThreadId,
        req: &RunRequest,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static;

    /// Retrieves the current state of a run.
    fn retrieve_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static;

    /// Asks the service to cancel a run that has not finished yet.
    fn cancel_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static;

    /// Lists messages of the thread.
    fn list_messages(
        &self,
        thread: &ThreadId,
        query: &MessageQuery,
    ) -> impl Future<Output = Result<Vec<ThreadMessage>, Self::Error>>
    + Send
    + 'static;
}
