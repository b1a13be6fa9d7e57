use std::cmp::min;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use urlencoding::encode;

use super::error::ApiError;
use super::models::{ClientOptions, Credentials, MAX_PAGE_SIZE};
use super::MonitorSource;

const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

pub struct DatadogClient {
    url: String,
    client: Client,
    options: ClientOptions,
}

enum Retry {
    RateLimited(Option<Duration>),
    Transient(String),
}

impl DatadogClient {
    pub fn new(credentials: &Credentials, options: ClientOptions) -> Result<Self, ApiError> {
        Self::with_base_url(credentials.base_url(), credentials, options)
    }

    pub fn with_base_url(
        url: impl Into<String>,
        credentials: &Credentials,
        options: ClientOptions,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("dd-api-key", sensitive_header(&credentials.api_key, "DATADOG_API_KEY")?);
        headers.insert("dd-application-key", sensitive_header(&credentials.app_key, "DATADOG_APP_KEY")?);
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::Setup(format!("Failed to build HTTP client: {}", e)))?;

        if options.page_size == 0 || options.page_size > MAX_PAGE_SIZE {
            return Err(ApiError::Setup(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, options.page_size
            )));
        }

        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            client,
            options,
        })
    }

    fn page_url(&self, page: usize) -> String {
        let mut url = format!(
            "{}/api/v1/monitor?page={}&page_size={}",
            self.url, page, self.options.page_size
        );
        if let Some(tags) = &self.options.filters.tags {
            url.push_str(&format!("&monitor_tags={}", encode(tags)));
        }
        if let Some(name) = &self.options.filters.name {
            url.push_str(&format!("&name={}", encode(name)));
        }
        url
    }

    /// Fetches a single page, retrying rate limits and transient failures.
    async fn fetch_page(&self, page: usize, cancel: &CancellationToken) -> Result<Vec<Value>, ApiError> {
        let url = self.page_url(page);
        let policy = self.options.retry;
        let mut backoff = policy.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            let retry = match self.client.get(&url).send().await {
                Ok(res) if res.status().is_success() => {
                    let status = res.status().as_u16();
                    match res.bytes().await {
                        Ok(body) => return decode_page(status, &body),
                        // The connection dropped or timed out mid-body.
                        Err(e) => Retry::Transient(format!("failed to read response body: {}", e)),
                    }
                }
                Ok(res) => {
                    let status = res.status();
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            let body = res.text().await.unwrap_or_default();
                            return Err(ApiError::Authentication(format!("{} {}", status, body.trim())));
                        }
                        StatusCode::TOO_MANY_REQUESTS => Retry::RateLimited(reset_after(res.headers())),
                        s if s.is_server_error() => Retry::Transient(format!("server returned {}", s)),
                        _ => {
                            let body = res.text().await.unwrap_or_default();
                            return Err(ApiError::Api {
                                status: status.as_u16(),
                                message: body,
                            });
                        }
                    }
                }
                Err(e) => Retry::Transient(e.to_string()),
            };

            attempt += 1;
            if attempt > policy.max_retries {
                return Err(match retry {
                    Retry::RateLimited(_) => ApiError::RateLimit { attempts: attempt },
                    Retry::Transient(cause) => ApiError::TransientNetwork { attempts: attempt, cause },
                });
            }

            let sleep_for = match &retry {
                Retry::RateLimited(Some(reset)) => min(*reset, policy.max_backoff),
                _ => backoff,
            };
            match &retry {
                Retry::RateLimited(_) => warn!(
                    "Rate limited on page {}. Retry {}/{} in {:?}...",
                    page, attempt, policy.max_retries, sleep_for
                ),
                Retry::Transient(cause) => warn!(
                    "Request for page {} failed: {}. Retry {}/{} in {:?}...",
                    page, cause, attempt, policy.max_retries, sleep_for
                ),
            }
            backoff = min(backoff.saturating_mul(2), policy.max_backoff);

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {},
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            }
        }
    }
}

#[async_trait]
impl MonitorSource for DatadogClient {
    async fn fetch_all_monitors(&self, cancel: &CancellationToken) -> Result<Vec<Value>, ApiError> {
        info!("Fetching monitors from {}", self.url);
        let mut monitors = Vec::new();

        for page in 0..self.options.max_pages {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let batch = self.fetch_page(page, cancel).await?;
            let received = batch.len();
            debug!("Page {}: {} monitors", page, received);
            monitors.extend(batch);

            if received < self.options.page_size {
                info!("Fetched {} monitors in {} pages", monitors.len(), page + 1);
                return Ok(monitors);
            }
        }

        Err(ApiError::PageLimit(self.options.max_pages))
    }
}

fn sensitive_header(value: &str, name: &str) -> Result<header::HeaderValue, ApiError> {
    let mut val = header::HeaderValue::from_str(value)
        .map_err(|_| ApiError::Authentication(format!("{} contains invalid characters", name)))?;
    val.set_sensitive(true);
    Ok(val)
}

fn reset_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(RATE_LIMIT_RESET)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn decode_page(status: u16, body: &[u8]) -> Result<Vec<Value>, ApiError> {
    let body: Value = serde_json::from_slice(body).map_err(|e| ApiError::Api {
        status,
        message: format!("Failed to parse monitor list: {}", e),
    })?;

    match body {
        Value::Array(items) => Ok(items),
        other => Err(ApiError::Api {
            status,
            message: format!("Expected a JSON array of monitors, got {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
