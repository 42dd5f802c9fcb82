use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3005/api";

pub const DEFAULT_USER_AGENT: &str = concat!("notification-client/", env!("CARGO_PKG_VERSION"));

/// Configurable options for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root every endpoint path is joined onto.
    pub base_url: String,

    /// Timeout for a single REST request. Not applied to the live stream.
    pub timeout: Duration,

    /// Connection timeout (time to establish the initial connection).
    pub connect_timeout: Duration,

    /// Value of the `Cookie` header carrying the authenticated session.
    pub cookie: Option<String>,

    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,

    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            cookie: None,
            headers: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Cache freshness settings for listing and stats queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// How long a fetched listing is served from cache without refetching.
    pub listing_stale_time_ms: u64,
    /// How long fetched statistics are served from cache.
    pub stats_stale_time_ms: u64,
    /// Page size used by infinite listings.
    pub infinite_page_size: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            listing_stale_time_ms: 30_000,
            stats_stale_time_ms: 60_000,
            infinite_page_size: 20,
        }
    }
}

impl QueryOptions {
    pub fn listing_stale_time(&self) -> Duration {
        Duration::from_millis(self.listing_stale_time_ms)
    }

    pub fn stats_stale_time(&self) -> Duration {
        Duration::from_millis(self.stats_stale_time_ms)
    }
}
