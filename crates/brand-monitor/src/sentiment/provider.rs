//! Sentiment provider trait and per-run provider configuration.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::ClientError;
use crate::nps::ThresholdConfig;

use super::types::{ProviderId, ResultKind, SentimentResult};

/// Trait for sentiment-analysis backends.
///
/// Implementations are stateless adapters over a remote API. A batch either
/// fully succeeds or fully fails; on success the returned vector has the same
/// length and order as `batch`.
#[async_trait]
pub trait SentimentProvider: Send + Sync {
    /// Identifier used to key accumulated results.
    fn id(&self) -> ProviderId;

    /// Family of every result this backend returns.
    fn result_kind(&self) -> ResultKind;

    /// Largest batch the backend accepts in one call.
    fn max_batch_size(&self) -> usize;

    /// Languages the backend can score, used when no explicit set is configured.
    fn default_languages(&self) -> HashSet<String>;

    /// Thresholds used when none are configured.
    fn default_thresholds(&self) -> ThresholdConfig;

    /// Analyze one batch of documents.
    async fn analyze(
        &self,
        batch: &[String],
        language: Option<&str>,
    ) -> Result<Vec<SentimentResult>, ClientError>;
}

/// A provider together with the run-scoped settings it is used with.
#[derive(Clone)]
pub struct ProviderConfig {
    /// The backend adapter.
    pub provider: Arc<dyn SentimentProvider>,
    /// Languages routed to this provider.
    pub supported_languages: HashSet<String>,
    /// Promoter/detractor thresholds for scoring.
    pub thresholds: ThresholdConfig,
}

impl ProviderConfig {
    /// Configure a provider with its own default languages and thresholds.
    pub fn new(provider: Arc<dyn SentimentProvider>) -> Self {
        let supported_languages = provider.default_languages();
        let thresholds = provider.default_thresholds();
        Self {
            provider,
            supported_languages,
            thresholds,
        }
    }

    /// Override the thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Override the routed languages.
    #[must_use]
    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Identifier of the wrapped provider.
    pub fn id(&self) -> ProviderId {
        self.provider.id()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider.id())
            .field("supported_languages", &self.supported_languages)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}
