use tokio::sync::OnceCell;
use whatski_model::{AssistantProvider, RunRequest, ThreadId};

use crate::client::{AssistantClient, ClientError};
use crate::transcript::{Message, Transcript};
use crate::turn::{self, PollPolicy, TurnError, TurnExecutor, TurnOutcome};

/// [`ChatSession`] builder.
///
/// The builder is cheap to clone, so a server can keep one as the template
/// for all sessions it creates.
#[derive(Clone)]
pub struct ChatSessionBuilder {
    client: AssistantClient,
    executor: TurnExecutor,
}

impl ChatSessionBuilder {
    /// Creates a new builder with the specified assistant provider.
    #[inline]
    pub fn with_assistant_provider<P: AssistantProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_client(AssistantClient::new(provider))
    }

    /// Creates a new builder sharing an existing client.
    #[inline]
    pub fn with_client(client: AssistantClient) -> Self {
        Self {
            executor: TurnExecutor::new(client.clone()),
            client,
        }
    }

    /// Sets how the session waits for runs.
    #[inline]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.executor = self.executor.with_poll_policy(policy);
        self
    }

    /// Sets the tools enabled for every run.
    #[inline]
    pub fn with_run_request(mut self, run_request: RunRequest) -> Self {
        self.executor = self.executor.with_run_request(run_request);
        self
    }

    /// Sets how many recent messages are inspected for a reply.
    #[inline]
    pub fn with_message_limit(mut self, limit: u8) -> Self {
        self.executor = self.executor.with_message_limit(limit);
        self
    }

    /// Builds the session. No request is made until the session is used.
    #[inline]
    pub fn build(self) -> ChatSession {
        ChatSession {
            client: self.client,
            executor: self.executor,
            thread: OnceCell::new(),
            transcript: Transcript::default(),
        }
    }
}

/// A chat session, like a window that displays messages and has an input
/// box.
///
/// The session owns the transcript and the handle of the server-side
/// thread. Turns take `&mut self`, so a session runs at most one turn at a
/// time.
pub struct ChatSession {
    client: AssistantClient,
    executor: TurnExecutor,
    thread: OnceCell<ThreadId>,
    transcript: Transcript,
}

impl ChatSession {
    /// Returns the thread of this session, creating it on first use.
    ///
    /// Later calls return the same thread without contacting the service.
    /// If creation fails, nothing is cached and the next call tries again.
    pub async fn create_session(&self) -> Result<&ThreadId, ClientError> {
        self.thread
            .get_or_try_init(|| async {
                let thread = self.client.create_thread().await?;
                info!("created conversation thread {thread}");
                Ok::<_, ClientError>(thread)
            })
            .await
    }

    /// Returns the thread, if it has been created.
    #[inline]
    pub fn thread(&self) -> Option<&ThreadId> {
        self.thread.get()
    }

    /// Returns the transcript.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Sends a user message and waits for the assistant.
    ///
    /// The transcript always grows by the user message and one assistant
    /// message, which is a placeholder if the turn failed.
    pub async fn send_message(&mut self, text: &str) -> TurnOutcome {
        let thread = match self.create_session().await.cloned() {
            Ok(thread) => thread,
            Err(err) => {
                let err = TurnError::CreateThread(err);
                self.transcript.push(Message::user(text));
                turn::record_failure(&mut self.transcript, &err);
                return TurnOutcome::Failed(err);
            }
        };
        self.executor
            .execute(&thread, &mut self.transcript, text)
            .await
    }

    /// Returns the message appended last, i.e. the latest reply after a
    /// turn.
    #[inline]
    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }
}

#[cfg(test)]
mod tests {
    use whatski_model::MessageRole;
    use whatski_test_model::{PresetRun, TestAssistantProvider};

    use super::*;
    use crate::turn::UNREACHABLE_REPLY;

    #[tokio::test]
    async fn test_create_session_is_idempotent() {
        let provider = TestAssistantProvider::default();
        let session =
            ChatSessionBuilder::with_assistant_provider(provider.clone())
                .build();
        assert!(session.thread().is_none());

        let first = session.create_session().await.unwrap().clone();
        let second = session.create_session().await.unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(session.thread(), Some(&first));
        assert_eq!(provider.calls().create_thread, 1);
    }

    #[tokio::test]
    async fn test_failed_creation_is_retried() {
        let provider = TestAssistantProvider::default();
        let session =
            ChatSessionBuilder::with_assistant_provider(provider.clone())
                .build();

        provider.set_unreachable(true);
        assert!(session.create_session().await.is_err());
        assert!(session.thread().is_none());

        provider.set_unreachable(false);
        assert!(session.create_session().await.is_ok());
        assert_eq!(provider.calls().create_thread, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_message() {
        let provider = TestAssistantProvider::default();
        provider.add_run(PresetRun::completed_with(["Hi there!"]));
        provider.add_run(PresetRun::completed_with(["Sure."]));
        let mut session =
            ChatSessionBuilder::with_assistant_provider(provider.clone())
                .build();

        assert!(session.send_message("Hello").await.is_replied());
        assert!(session.send_message("Can you help?").await.is_replied());

        assert_eq!(session.transcript().len(), 4);
        assert_eq!(session.last_message().unwrap().content(), "Sure.");
        assert_eq!(provider.calls().create_thread, 1);
        let thread = session.thread().unwrap();
        assert_eq!(provider.messages(thread).len(), 4);
    }

    #[tokio::test]
    async fn test_send_message_without_thread() {
        let provider = TestAssistantProvider::default();
        provider.set_unreachable(true);
        let mut session =
            ChatSessionBuilder::with_assistant_provider(provider).build();

        let outcome = session.send_message("Hello").await;

        assert!(matches!(
            outcome,
            TurnOutcome::Failed(TurnError::CreateThread(_))
        ));
        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), MessageRole::User);
        assert_eq!(messages[1].content(), UNREACHABLE_REPLY);
    }
}
