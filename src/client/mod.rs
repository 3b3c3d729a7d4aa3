//! Rate-limited, retrying HTTP access to the NCBI E-utilities API.

mod eutils;
mod pubmed;
mod rate_limit;

pub use eutils::{EutilsClient, EutilsConfig};
pub use pubmed::{PaperSource, PubMedSource};
pub use rate_limit::{RateLimiter, DEFAULT_MIN_INTERVAL};

/// Errors from the bibliographic API layer
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP status outside the success range
    #[error("API returned status {status}")]
    Status { status: u16, retriable: bool },

    /// Network-level failure (connect, timeout, read)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// All retries exhausted; callers must not retry further within the
    /// same engine iteration
    #[error("Request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Whether the client may retry this error with backoff
    pub fn is_retriable(&self) -> bool {
        match self {
            ApiError::Status { retriable, .. } => *retriable,
            ApiError::Network(_) => true,
            ApiError::Parse(_) => false,
            ApiError::RetriesExhausted { .. } => false,
        }
    }
}

impl From<quick_xml::DeError> for ApiError {
    fn from(err: quick_xml::DeError) -> Self {
        ApiError::Parse(format!("XML: {}", err))
    }
}
