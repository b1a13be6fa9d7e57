use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authentication rejected by Datadog: {0}")]
    Authentication(String),
    #[error("Rate limited by Datadog, gave up after {attempts} attempts")]
    RateLimit { attempts: u32 },
    #[error("Network error after {attempts} attempts: {cause}")]
    TransientNetwork { attempts: u32, cause: String },
    #[error("Datadog API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Stopped after {0} pages without reaching the last one")]
    PageLimit(usize),
    #[error("Invalid client setup: {0}")]
    Setup(String),
    #[error("Fetch cancelled")]
    Cancelled,
}
