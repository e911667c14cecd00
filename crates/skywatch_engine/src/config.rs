use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Everything the HTTP client needs; passed in at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Sent as `X-API-Key`; `None` makes every request anonymous.
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    /// Requests wait for the transport to give up unless this is set.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub client: ClientConfig,
    pub poll_interval: Duration,
    /// Wait before the single retry of a reveal whose anchor was not rendered yet.
    pub reveal_retry_delay: Duration,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            poll_interval: Duration::from_secs(3),
            reveal_retry_delay: Duration::from_millis(250),
        }
    }
}
