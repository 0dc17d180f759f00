//! Executing one question-and-answer exchange.

mod error;
mod poll;

use tracing::Instrument;
use whatski_model::{
    MessageId, MessageQuery, MessageRole, RunRequest, ThreadId, ThreadMessage,
};

use crate::client::AssistantClient;
use crate::transcript::{Message, Transcript};
pub use error::*;
pub use poll::PollPolicy;

const DEFAULT_MESSAGE_LIMIT: u8 = 5;

/// The result of a turn.
///
/// Either way, the transcript has received exactly one user message and
/// one assistant message; on failure the assistant message is the
/// placeholder of the error.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The assistant replied.
    Replied,
    /// The reply was replaced by a placeholder.
    Failed(TurnError),
}

impl TurnOutcome {
    /// Returns `true` if the assistant replied.
    #[inline]
    pub fn is_replied(&self) -> bool {
        matches!(self, TurnOutcome::Replied)
    }
}

/// Drives a turn: submits the user message, runs the assistant, waits for
/// the run and records the reply.
#[derive(Clone)]
pub struct TurnExecutor {
    client: AssistantClient,
    policy: PollPolicy,
    run_request: RunRequest,
    message_limit: u8,
}

impl TurnExecutor {
    /// Creates an executor with the default poll policy, the retrieval
    /// tool enabled and the default message limit.
    #[inline]
    pub fn new(client: AssistantClient) -> Self {
        Self {
            client,
            policy: PollPolicy::default(),
            run_request: RunRequest::default(),
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    /// Sets the poll policy.
    #[inline]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the run request, i.e. the tools enabled for every run.
    #[inline]
    pub fn with_run_request(mut self, run_request: RunRequest) -> Self {
        self.run_request = run_request;
        self
    }

    /// Sets how many recent messages are inspected for the reply.
    #[inline]
    pub fn with_message_limit(mut self, limit: u8) -> Self {
        self.message_limit = limit.max(1);
        self
    }

    /// Runs one turn on `thread`, appending the user message and the
    /// assistant reply (or a placeholder) to `transcript`.
    pub async fn execute(
        &self,
        thread: &ThreadId,
        transcript: &mut Transcript,
        user_text: &str,
    ) -> TurnOutcome {
        let span = info_span!("turn", %thread);
        transcript.push(Message::user(user_text));
        let result = self
            .run(thread, transcript, user_text)
            .instrument(span.clone())
            .await;
        span.in_scope(|| match result {
            Ok(reply) => {
                info!("assistant replied ({} chars)", reply.len());
                transcript.push(Message::assistant(reply));
                TurnOutcome::Replied
            }
            Err(err) => {
                record_failure(transcript, &err);
                TurnOutcome::Failed(err)
            }
        })
    }

    async fn run(
        &self,
        thread: &ThreadId,
        transcript: &Transcript,
        user_text: &str,
    ) -> Result<String, TurnError> {
        let user_msg = self
            .client
            .add_user_message(thread, user_text)
            .await
            .map_err(TurnError::Submit)?;
        let run = self
            .client
            .create_run(thread, &self.run_request)
            .await
            .map_err(TurnError::StartRun)?;
        debug!("started run {}", run.id);

        let run =
            poll::wait_for_run(&self.client, &self.policy, thread, run).await?;
        if !run.status.is_success() {
            return Err(TurnError::RunEnded {
                status: run.status,
                reason: run.last_error,
            });
        }

        let messages = self
            .client
            .list_messages(thread, &MessageQuery::latest(self.message_limit))
            .await
            .map_err(TurnError::FetchReply)?;
        select_reply(&messages, &user_msg, transcript)
            .map(ToOwned::to_owned)
            .ok_or(TurnError::NoReply)
    }
}

/// Appends the placeholder of `err` as the assistant message.
pub(crate) fn record_failure(transcript: &mut Transcript, err: &TurnError) {
    match err {
        TurnError::RunEnded { .. }
        | TurnError::TimedOut { .. }
        | TurnError::NoReply => warn!("turn failed: {err}"),
        _ => error!("turn failed: {err}"),
    }
    transcript.push(Message::assistant(err.placeholder()));
}

/// Picks the reply from messages listed newest first.
///
/// Only messages newer than `user_msg` are considered, and an assistant
/// message whose text already appears in the transcript is skipped.
pub fn select_reply<'a>(
    messages: &'a [ThreadMessage],
    user_msg: &MessageId,
    transcript: &Transcript,
) -> Option<&'a str> {
    messages
        .iter()
        .take_while(|msg| &msg.id != user_msg)
        .filter(|msg| msg.role == MessageRole::Assistant)
        .find(|msg| !transcript.contains_content(&msg.text))
        .map(|msg| msg.text.as_str())
}
