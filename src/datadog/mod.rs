pub(crate) mod client;
pub(crate) mod error;
pub(crate) mod models;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use error::ApiError;
pub use models::{ClientOptions, Credentials, MonitorFilters, RetryPolicy, MAX_PAGE_SIZE};

/// Anything that can produce the raw monitor list.
#[async_trait]
pub trait MonitorSource: Send + Sync {
    async fn fetch_all_monitors(&self, cancel: &CancellationToken) -> Result<Vec<Value>, ApiError>;
}

pub fn init(credentials: &Credentials, options: ClientOptions) -> Result<client::DatadogClient, ApiError> {
    client::DatadogClient::new(credentials, options)
}
