use std::fmt;
use std::time::Duration;

/// Keys and site used to reach the Datadog API.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub app_key: String,
    pub site: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_key: app_key.into(),
            site: site.into(),
        }
    }

    /// `https://api.<site>`, e.g. `https://api.datadoghq.eu`.
    pub fn base_url(&self) -> String {
        format!("https://api.{}", self.site.trim_end_matches('/'))
    }
}

// Keys never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"***")
            .field("app_key", &"***")
            .field("site", &self.site)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Server-side filters forwarded to the list endpoint.
#[derive(Debug, Clone, Default)]
pub struct MonitorFilters {
    /// Comma separated monitor tags, e.g. `env:prod,team:sre`.
    pub tags: Option<String>,
    /// Substring match on the monitor name.
    pub name: Option<String>,
}

impl MonitorFilters {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.name.is_none()
    }
}

/// Largest `page_size` the monitor list endpoint honors.
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub page_size: usize,
    pub max_pages: usize,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub filters: MonitorFilters,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 1000,
            timeout_secs: 30,
            connect_timeout_secs: 10,
            retry: RetryPolicy::default(),
            filters: MonitorFilters::default(),
        }
    }
}
