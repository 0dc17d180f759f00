//! An assistant provider for OpenAI-compatible Assistants APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, Method, RequestBuilder, StatusCode, header};
use serde::de::DeserializeOwned;
use whatski_model::{
    AssistantProvider, AssistantProviderError, ErrorKind, MessageId,
    MessageQuery, Run, RunId, RunRequest, ThreadId, ThreadMessage,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{
    CreateThreadRequest, ErrorEnvelope, MessageList, MessageObject, RunObject,
    ThreadObject,
};

const BETA_HEADER: &str = "OpenAI-Beta";
const BETA_VERSION: &str = "assistants=v2";

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl AssistantProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible assistant provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.config.base_url, path))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(BETA_HEADER, BETA_VERSION)
            .header(header::ACCEPT, "application/json")
            .timeout(self.config.request_timeout)
    }
}

impl AssistantProvider for OpenAIProvider {
    type Error = Error;

    fn create_thread(
        &self,
    ) -> impl Future<Output = Result<ThreadId, Self::Error>> + Send + 'static
    {
        let req = self
            .request(Method::POST, "/threads")
            .json(&CreateThreadRequest {});
        async move {
            let thread: ThreadObject = send_json(req).await?;
            debug!("created thread {}", thread.id);
            Ok(thread.into())
        }
    }

    fn add_user_message(
        &self,
        thread: &ThreadId,
        content: &str,
    ) -> impl Future<Output = Result<MessageId, Self::Error>> + Send + 'static
    {
        let req = self
            .request(Method::POST, &format!("/threads/{thread}/messages"))
            .json(&proto::create_message_request(content));
        async move {
            let msg: MessageObject = send_json(req).await?;
            Ok(MessageId::new(msg.id))
        }
    }

    fn create_run(
        &self,
        thread: &ThreadId,
        req: &RunRequest,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let req = self
            .request(Method::POST, &format!("/threads/{thread}/runs"))
            .json(&proto::create_run_request(req, &self.config));
        async move {
            let run: RunObject = send_json(req).await?;
            debug!("created run {} ({:?})", run.id, run.status);
            Ok(run.into())
        }
    }

    fn retrieve_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let req =
            self.request(Method::GET, &format!("/threads/{thread}/runs/{run}"));
        async move {
            let run: RunObject = send_json(req).await?;
            Ok(run.into())
        }
    }

    fn cancel_run(
        &self,
        thread: &ThreadId,
        run: &RunId,
    ) -> impl Future<Output = Result<Run, Self::Error>> + Send + 'static {
        let req = self.request(
            Method::POST,
            &format!("/threads/{thread}/runs/{run}/cancel"),
        );
        async move {
            let run: RunObject = send_json(req).await?;
            Ok(run.into())
        }
    }

    fn list_messages(
        &self,
        thread: &ThreadId,
        query: &MessageQuery,
    ) -> impl Future<Output = Result<Vec<ThreadMessage>, Self::Error>>
    + Send
    + 'static {
        let req = self.request(
            Method::GET,
            &format!(
                "/threads/{thread}/messages?order={}&limit={}",
                query.order.as_str(),
                query.limit
            ),
        );
        async move {
            let list: MessageList = send_json(req).await?;
            Ok(list.data.into_iter().map(Into::into).collect())
        }
    }
}

async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, Error> {
    let resp = req
        .send()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Network))?;

    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let body = resp
        .text()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Network))?;
    trace!("got response ({status}): {body}");

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or_else(|_| format!("HTTP status {status}"));
        return Err(Error::new(message, kind_for_status(status)));
    }

    let is_json = content_type
        .as_deref()
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| m.subtype() == mime::JSON)
        .unwrap_or(false);
    if !is_json {
        return Err(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ErrorKind::InvalidResponse,
        ));
    }

    serde_json::from_str(&body)
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::InvalidResponse))
}

fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ErrorKind::Unauthorized
        }
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        s if s.is_server_error() => ErrorKind::Network,
        _ => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_kinds() {
        assert_eq!(
            kind_for_status(StatusCode::UNAUTHORIZED),
            ErrorKind::Unauthorized
        );
        assert_eq!(kind_for_status(StatusCode::FORBIDDEN), ErrorKind::Unauthorized);
        assert_eq!(kind_for_status(StatusCode::NOT_FOUND), ErrorKind::NotFound);
        assert_eq!(
            kind_for_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            kind_for_status(StatusCode::BAD_GATEWAY),
            ErrorKind::Network
        );
        assert_eq!(kind_for_status(StatusCode::BAD_REQUEST), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let config = OpenAIConfigBuilder::with_credentials("xxx", "asst_1")
            .with_base_url("http://127.0.0.1:1")
            .build();
        let provider = OpenAIProvider::new(config);
        let err = provider.create_thread().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
