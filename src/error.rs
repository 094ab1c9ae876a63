use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("API Error: {0}")]
    Api(reqwest::Error),

    #[error("API Error {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Generation Failed: {0}")]
    GenerationFailed(String),

    #[error("Validation Failed: {0}")]
    ValidationFailed(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Quota exceeded for {feature}: plan allows {limit}")]
    QuotaExceeded { feature: String, limit: u32 },

    #[error("Rate limited: retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upload rejected: {0}")]
    Upload(String),

    #[error("PDF Error: {0}")]
    Pdf(#[from] lopdf::Error),
}

impl From<reqwest::Error> for LabError {
    /// Drops the request URL from the error.
    fn from(e: reqwest::Error) -> Self {
        LabError::Api(e.without_url())
    }
}

impl LabError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LabError::Api(e) => !e.is_decode() && !e.is_builder(),
            LabError::ApiStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_throttling_and_server_errors_are_retryable() {
        let status = |status| LabError::ApiStatus { status, body: String::new() };
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!LabError::GenerationFailed("blocked".into()).is_retryable());
        assert!(!LabError::Config("x".into()).is_retryable());
    }
}
