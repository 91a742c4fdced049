use reqwest::StatusCode;
use thiserror::Error;

use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(StatusCode),

    #[error("upstream API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("failed to decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(e) => !e.is_decode() && !e.is_builder(),
            ProviderError::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ProviderError::Api { .. } | ProviderError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("no news provider has credentials configured")]
    NoCredentials,

    #[error("no provider returned any articles")]
    NoArticles,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion endpoint returned HTTP {0}")]
    Status(StatusCode),

    #[error("completion response had no content")]
    EmptyCompletion,

    #[error("malformed translation payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected {expected} translated articles, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}
