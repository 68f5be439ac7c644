use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://bedrock-runtime.us-east-1.amazonaws.com";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;

/// Transport settings for [`super::converse::ConverseProvider`]
#[derive(Debug, Clone)]
pub struct ConverseProviderConfig {
    pub host: String,
    pub api_key: String,
    pub connect_timeout: Duration,
    /// Ceiling for a whole call, body included. Long enough for slow generations.
    pub read_timeout: Duration,
    /// Retries after the first attempt, for transport failures only. HTTP error
    /// statuses are never retried.
    pub retry_attempts: u32,
}

impl ConverseProviderConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }
}

impl Default for ConverseProviderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, String::new())
    }
}
