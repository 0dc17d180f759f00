use std::fmt::Debug;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    assistant_id: String,
    base_url: Option<String>,
    request_timeout: Option<Duration>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder with the API key and the assistant to run.
    #[inline]
    pub fn with_credentials<K, A>(api_key: K, assistant_id: A) -> Self
    where
        K: Into<String>,
        A: Into<String>,
    {
        Self {
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            base_url: None,
            request_timeout: None,
        }
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the timeout applied to every single HTTP request.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        OpenAIConfig {
            api_key: self.api_key,
            assistant_id: self.assistant_id,
            base_url: base_url.trim_end_matches('/').to_owned(),
            request_timeout: self
                .request_timeout
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible assistant provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) assistant_id: String,
    pub(crate) base_url: String,
    pub(crate) request_timeout: Duration,
}

impl OpenAIConfig {
    /// Returns the assistant that runs are started with.
    #[inline]
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
