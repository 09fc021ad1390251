//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client starts with zero configuration
//! against a backend on `localhost:8000`.

use std::path::PathBuf;
use std::time::Duration;

use precis_shared::constants::{DEFAULT_API_URL, DEFAULT_HISTORY_PAGE_SIZE, DEFAULT_MESSAGE_LIMIT};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL.
    /// Env: `PRECIS_API_URL`
    /// Default: `http://localhost:8000`
    pub api_url: String,

    /// Directory holding `precis.db`.
    /// Env: `PRECIS_DATA_DIR`
    /// Default: `None` (platform data directory).
    pub data_dir: Option<PathBuf>,

    /// Conversations fetched per history page.
    /// Env: `PRECIS_HISTORY_PAGE_SIZE`
    /// Default: `20`
    pub history_page_size: u32,

    /// Messages fetched when a conversation is opened.
    /// Env: `PRECIS_MESSAGE_LIMIT`
    /// Default: `50`
    pub message_limit: u32,

    /// Per-request timeout.
    /// Env: `PRECIS_REQUEST_TIMEOUT_SECS`
    /// Default: `30`
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: None,
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            message_limit: DEFAULT_MESSAGE_LIMIT,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("PRECIS_API_URL") {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                tracing::warn!("Empty PRECIS_API_URL, using default");
            } else {
                config.api_url = url.to_string();
            }
        }

        if let Some(dir) = lookup("PRECIS_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(n) = parse_positive(&lookup, "PRECIS_HISTORY_PAGE_SIZE") {
            config.history_page_size = n;
        }

        if let Some(n) = parse_positive(&lookup, "PRECIS_MESSAGE_LIMIT") {
            config.message_limit = n;
        }

        if let Some(secs) = parse_positive(&lookup, "PRECIS_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(u64::from(secs));
        }

        config
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u32> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
