//! Error types for the mention pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::sentiment::ProviderId;

/// Errors raised by the HTTP collaborators (mention feed and sentiment providers).
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response decoded but does not match what was requested
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request signing failed
    #[error("Request signing failed: {0}")]
    Signing(String),
}

/// Errors that terminate a pipeline run.
///
/// None of these are retried internally. Validation errors are raised before
/// any I/O; fetch errors carry the index of the page being processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Time window violates the feed's constraints
    #[error("Invalid time window {start} .. {end}: {reason}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: String,
    },

    /// Non-positive batch size
    #[error("Invalid batch size {0}: must be greater than zero")]
    InvalidBatchSize(usize),

    /// Provider set is empty or names the same provider twice
    #[error("Invalid provider configuration: {0}")]
    InvalidProviders(String),

    /// Threshold outside the provider's accepted range
    #[error("Invalid threshold {value}: {reason}")]
    InvalidThreshold { value: f64, reason: String },

    /// Mention feed failed while fetching a page
    #[error("Feed fetch failed on page {page}: {source}")]
    FeedFetch {
        page: usize,
        #[source]
        source: ClientError,
    },

    /// Sentiment provider failed while analysing a page
    #[error("Provider {provider} failed on page {page}: {source}")]
    ProviderFetch {
        page: usize,
        provider: ProviderId,
        #[source]
        source: ClientError,
    },

    /// Feed handed back a continuation token it had already returned
    #[error("Pagination loop detected on page {page}: token {token:?} repeated")]
    PaginationLoop { page: usize, token: String },

    /// Nothing to score
    #[error("Cannot compute a score over zero documents")]
    DivisionByZero,
}

impl PipelineError {
    /// Whether the error was raised before any network call was made.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidWindow { .. }
                | Self::InvalidBatchSize(_)
                | Self::InvalidProviders(_)
                | Self::InvalidThreshold { .. }
        )
    }
}

/// Result alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
