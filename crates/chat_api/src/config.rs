use std::collections::BTreeMap;
use std::time::Duration;

use crate::url::DEFAULT_CHAT_BASE_URL;

/// Transport configuration for chat completion requests.
#[derive(Clone)]
pub struct ChatApiConfig {
    /// Bearer token passed to `Authorization`.
    pub api_key: String,
    /// Base URL; normalized to the `/chat/completions` endpoint.
    pub base_url: String,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Additional headers merged into request headers.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
    /// Base delay for retry backoff. Tests shrink it.
    pub retry_base_delay: Option<Duration>,
}

impl std::fmt::Debug for ChatApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .field("retry_base_delay", &self.retry_base_delay)
            .finish()
    }
}

impl Default for ChatApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            user_agent: None,
            extra_headers: BTreeMap::new(),
            timeout: None,
            retry_base_delay: None,
        }
    }
}

impl ChatApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
