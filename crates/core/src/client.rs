use std::pin::Pin;
use std::sync::Arc;

use tracing::Instrument;
use whatski_model::{
    AssistantProvider, AssistantProviderError, MessageId, MessageQuery, Run,
    RunId, RunRequest, ThreadId, ThreadMessage,
};

/// A type-erased error from the assistant provider.
pub type ClientError = Box<dyn AssistantProviderError>;

type ClientResult<T> = Result<T, ClientError>;
type BoxedFuture<T> = Pin<Box<dyn Future<Output = ClientResult<T>> + Send>>;

trait AssistantObject: Send + Sync + 'static {
    fn create_thread(&self) -> BoxedFuture<ThreadId>;

    fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> BoxedFuture<MessageId>;

    fn create_run(&self, thread: &ThreadId, req: &RunRequest) -> BoxedFuture<Run>;

    fn retrieve_run(&self, thread: &ThreadId, run: &RunId) -> BoxedFuture<Run>;

    fn cancel_run(&self, thread: &ThreadId, run: &RunId) -> BoxedFuture<Run>;

    fn list_messages(
        &self,
        thread: &ThreadId,
        query: &MessageQuery,
    ) -> BoxedFuture<Vec<ThreadMessage>>;
}

struct AssistantObjectImpl<P>(P);

impl<P: AssistantProvider + 'static> AssistantObject for AssistantObjectImpl<P> {
    #[inline]
    fn create_thread(&self) -> BoxedFuture<ThreadId> {
        erase(self.0.create_thread(), trace_span!("create thread"))
    }

    #[inline]
    fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> BoxedFuture<MessageId> {
        erase(
            self.0.add_user_message(thread, content),
            trace_span!("add user message", %thread),
        )
    }

    #[inline]
    fn create_run(&self, thread: &ThreadId, req: &RunRequest) -> BoxedFuture<Run> {
        erase(
            self.0.create_run(thread, req),
            trace_span!("create run", %thread),
        )
    }

    #[inline]
    fn retrieve_run(&self, thread: &ThreadId, run: &RunId) -> BoxedFuture<Run> {
        erase(
            self.0.retrieve_run(thread, run),
            trace_span!("retrieve run", %thread, %run),
        )
    }

    #[inline]
    fn cancel_run(&self, thread: &ThreadId, run: &RunId) -> BoxedFuture<Run> {
        erase(
            self.0.cancel_run(thread, run),
            trace_span!("cancel run", %thread, %run),
        )
    }

    #[inline]
    fn list_messages(
        &self,
        thread: &ThreadId,
        query: &MessageQuery,
    ) -> BoxedFuture<Vec<ThreadMessage>> {
        erase(
            self.0.list_messages(thread, query),
            trace_span!("list messages", %thread),
        )
    }
}

fn erase<T, E, F>(fut: F, span: tracing::Span) -> BoxedFuture<T>
where
    E: AssistantProviderError,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::pin(
        async move {
            fut.await.map_err(|err| {
                debug!("provider error: {err:?}");
                Box::new(err) as ClientError
            })
        }
        .instrument(span),
    )
}

/// A wrapper around an assistant provider that provides a type-erased
/// interface for the other modules.
///
/// Cloning is cheap; all clones share the same provider.
#[derive(Clone)]
pub struct AssistantClient {
    inner: Arc<dyn AssistantObject>,
}

impl AssistantClient {
    /// Wraps the provider.
    #[inline]
    pub fn new<P: AssistantProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `AssistantClient` is shared by
        // sessions and request handlers that must not be generic over it.
        Self {
            inner: Arc::new(AssistantObjectImpl(provider)),
        }
    }

    /// Creates a new conversation thread.
    #[inline]
    pub async fn create_thread(&self) -> ClientResult<ThreadId> {
        self.inner.create_thread().await
    }

    /// Appends a user message to the thread.
    #[inline]
    pub async fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> ClientResult<MessageId> {
        self.inner.add_user_message(thread, content).await
    }

    /// Starts a run on the thread.
    #[inline]
    pub async fn create_run(
        &self,
        thread: &ThreadId,
        req: &RunRequest,
    ) -> ClientResult<Run> {
        self.inner.create_run(thread, req).await
    }

    /// Retrieves the current state of a run.
    #[inline]
    pub async fn retrieve_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> ClientResult<Run> {
        self.inner.retrieve_run(thread, run).await
    }

    /// Requests cancellation of a run.
    #[inline]
    pub async fn cancel_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> ClientResult<Run> {
        self.inner.cancel_run(thread, run).await
    }

    /// Lists messages of the thread.
    #[inline]
    pub async fn list_messages(
        &self,
        thread: &ThreadId,
        query: &MessageQuery,
    ) -> ClientResult<Vec<ThreadMessage>> {
        self.inner.list_messages(thread, query).await
    }
}

#[cfg(test)]
mod tests {
    use whatski_model::{ErrorKind, MessageRole, RunStatus};
    use whatski_test_model::{PresetRun, TestAssistantProvider};

    use super::*;

    #[tokio::test]
    async fn test_erased_calls() {
        let provider = TestAssistantProvider::default();
        provider.add_run(PresetRun::with_statuses([RunStatus::Completed]));
        let client = AssistantClient::new(provider.clone());

        let thread = client.create_thread().await.unwrap();
        client.add_user_message(&thread, "Hi").await.unwrap();
        let run = client
            .create_run(&thread, &RunRequest::default())
            .await
            .unwrap();
        let run = client.retrieve_run(&thread, &run.id).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);

        let messages = client
            .list_messages(&thread, &MessageQuery::latest(5))
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(provider.calls().retrieve_run, 1);
    }

    #[tokio::test]
    async fn test_error_kind_survives_erasure() {
        let provider = TestAssistantProvider::default();
        provider.set_unreachable(true);
        let client = AssistantClient::new(provider);
        let err = client.create_thread().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
