//! Mention pipeline - orchestrates the full page-route-batch-analyze-score flow.

mod batcher;
mod driver;
mod router;
mod window;

pub use batcher::chunk;
pub use driver::{AccumulatedState, PaginationDriver, Phase, ProviderResults, RunFailure};
pub use router::route;
pub use window::{
    default_lookback, TimeWindow, DEFAULT_LOOKBACK_SECS, MAX_MAX_RESULTS, MIN_MAX_RESULTS,
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::PipelineResult;
use crate::nps::{self, NpsResult};
use crate::sentiment::{ProviderConfig, ProviderId};
use crate::twitter::MentionFeed;

/// Configuration for the mention pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Account whose mentions are analysed.
    pub target_id: String,
    /// Page size requested from the feed.
    pub max_results: u32,
    /// How far back the feed accepts windows.
    pub lookback: Duration,
}

impl PipelineConfig {
    /// Configuration with the feed's default page size and lookback.
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            max_results: MAX_MAX_RESULTS,
            lookback: default_lookback(),
        }
    }
}

/// Outcome of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Score per provider.
    pub nps: BTreeMap<ProviderId, NpsResult>,
    /// Everything accumulated while paging.
    pub state: AccumulatedState,
}

/// Mention pipeline orchestrator.
pub struct Pipeline {
    config: PipelineConfig,
    feed: Arc<dyn MentionFeed>,
    providers: Vec<ProviderConfig>,
}

impl Pipeline {
    /// Create a new pipeline.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        feed: Arc<dyn MentionFeed>,
        providers: Vec<ProviderConfig>,
    ) -> Self {
        Self {
            config,
            feed,
            providers,
        }
    }

    /// Page the whole window, then score each provider once.
    pub async fn run(&self, window: &TimeWindow) -> PipelineResult<PipelineReport> {
        tracing::info!(
            target_id = %self.config.target_id,
            start = %window.start,
            end = %window.end,
            providers = self.providers.len(),
            "Starting pipeline run"
        );

        let driver = PaginationDriver::new(
            self.feed.clone(),
            self.providers.clone(),
            self.config.target_id.clone(),
            self.config.max_results,
            self.config.lookback,
        );
        let state = driver.run(window).await?;

        let total = state.total_document_count();
        let mut scores = BTreeMap::new();
        for config in &self.providers {
            let id = config.id();
            let result = nps::score(state.results(&id), total, &config.thresholds)?;
            tracing::info!(
                provider = %id,
                promoters = result.promoters_count,
                detractors = result.detractors_count,
                total = result.total_documents,
                score = result.score,
                "Scored provider"
            );
            scores.insert(id, result);
        }

        Ok(PipelineReport { nps: scores, state })
    }
}

/// Run the pipeline for `target_id` over `[window_start, window_end]`.
pub async fn run_pipeline(
    feed: Arc<dyn MentionFeed>,
    target_id: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    providers: Vec<ProviderConfig>,
) -> PipelineResult<BTreeMap<ProviderId, NpsResult>> {
    let pipeline = Pipeline::new(PipelineConfig::new(target_id), feed, providers);
    let report = pipeline
        .run(&TimeWindow::new(window_start, window_end))
        .await?;
    Ok(report.nps)
}
