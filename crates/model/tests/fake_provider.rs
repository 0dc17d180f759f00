use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex};

use whatski_model::{
    AssistantProvider, AssistantProviderError, ErrorKind, MessageId,
    MessageQuery, MessageRole, Run, RunId, RunRequest, RunStatus, ThreadId,
    ThreadMessage,
};

#[derive(Debug)]
struct FakeProviderError(ErrorKind);

impl Display for FakeProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeProviderError {}

impl AssistantProviderError for FakeProviderError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes every user message back as soon as a run is created.
#[derive(Default)]
struct EchoProvider {
    messages: Arc<Mutex<Vec<ThreadMessage>>>,
}

impl AssistantProvider for EchoProvider {
    type Error = FakeProviderError;

    fn create_thread(
        &self,
    ) -> impl Future<Output = Result<ThreadId, Self::Error>> + Send + 'static
    {
        ready(Ok(ThreadId::new("thread:0")))
    }

    fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> impl Future<Output = Result<MessageId, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            if thread.as_str() != "thread:0" {
                break 'blk Err(FakeProviderError(ErrorKind::NotFound));
            }
            let mut messages = self.messages.lock().unwrap();
            let id = MessageId::new(format!("msg:{}", messages.len()));
            messages.push(ThreadMessage {
                id: id.clone(),
                role: MessageRole::User,
                text: content.to_owned(),
            });
            Ok(id)
        };
        ready(result)
    }

    fn create_run(
        &self,
        _thread: &ThreadId,
        _req: &RunRequest,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let mut messages = self.messages.lock().unwrap();
        let last = messages.last().map(|m| m.text.clone()).unwrap_or_default();
        let id = MessageId::new(format!("msg:{}", messages.len()));
        messages.push(ThreadMessage {
            id,
            role: MessageRole::Assistant,
            text: format!("You said {last}"),
        });
        ready(Ok(Run {
            id: RunId::new("run:0"),
            status: RunStatus::Completed,
            last_error: None,
        }))
    }

    fn retrieve_run(
        &self,
        _thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        ready(Ok(Run {
            id: run.clone(),
            status: RunStatus::Completed,
            last_error: None,
        }))
    }

    fn cancel_run(
        &self,
        _thread: &ThreadId,
        _run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        ready(Err(FakeProviderError(ErrorKind::Other)))
    }

    fn list_messages(
        &self,
        _thread: &ThreadId,
        query: &MessageQuery,
    ) -> impl Future<Output = Result<Vec<ThreadMessage>, Self::Error>>
    + Send
    + 'static {
        let messages = self.messages.lock().unwrap();
        let listed = messages
            .iter()
            .rev()
            .take(query.limit as usize)
            .cloned()
            .collect();
        ready(Ok(listed))
    }
}

#[tokio::test]
async fn test_round_trip() {
    let provider = EchoProvider::default();
    let thread = provider.create_thread().await.unwrap();
    provider
        .add_user_message(&thread, "Good morning")
        .await
        .unwrap();
    let run = provider
        .create_run(&thread, &RunRequest::default())
        .await
        .unwrap();
    let run = provider.retrieve_run(&thread, &run.id).await.unwrap();
    assert!(run.status.is_success());

    let messages = provider
        .list_messages(&thread, &MessageQuery::latest(5))
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::Assistant);
    assert_eq!(messages[0].text, "You said Good morning");
}

#[tokio::test]
async fn test_error() {
    let provider = EchoProvider::default();
    let err = provider
        .add_user_message(&ThreadId::new("thread:missing"), "Hi")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
