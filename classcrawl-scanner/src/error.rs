use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Navigation to {url} timed out after {}ms", .timeout.as_millis())]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("Page evaluation failed: {0}")]
    Evaluation(String),

    #[error("Page evaluation timed out after {}ms", .0.as_millis())]
    EvaluationTimeout(Duration),

    #[error("Proxy authentication failed: {0}")]
    Authentication(String),

    #[error("Browser error: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
