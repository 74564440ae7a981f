//! Client configuration
//!
//! Endpoint, timeout and retry parameters used by the API client and the chat session.

use std::time::Duration;

use crate::storage::settings::AppSettings;

/// Local development backend
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment variable overriding the backend base URL
pub const API_URL_ENV: &str = "MENU_CHAT_API_URL";

/// Prior messages replayed to the backend as history
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Retry policy for the streaming endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection attempts in total, the first one included
    pub max_attempts: u32,
    /// Multiplied by `2^attempt` to get the delay after a failed attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after `attempt` (1-based) failed: 2s, 4s, 8s... with the default base
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL without trailing slash
    pub base_url: String,
    /// Upper bound for `/chat` and `/health`
    pub request_timeout: Duration,
    /// A stream read waiting longer than this logs a warning
    pub stall_warning: Duration,
    pub retry: RetryPolicy,
    /// Number of prior messages replayed as history
    pub history_limit: usize,
}

impl ClientConfig {
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            ..Self::default()
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            stall_warning: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl From<&AppSettings> for ClientConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            base_url: normalize_base_url(&settings.api_base_url),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            stall_warning: Duration::from_secs(settings.stall_warning_secs),
            retry: RetryPolicy {
                max_attempts: settings.stream_max_attempts,
                ..RetryPolicy::default()
            },
            history_limit: settings.history_limit,
        }
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}
