//! Pagination driver: pages the mention feed and accumulates provider results.

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{ClientError, PipelineError, PipelineResult};
use crate::sentiment::{ProviderConfig, ProviderId, ResultKind, SentimentResult};
use crate::twitter::{Mention, MentionFeed, Page, PageRequest};

use super::batcher;
use super::router;
use super::window::TimeWindow;

/// Phase of a driver run.
///
/// Transitions are single-directional:
/// `Fetching -> Routing -> Dispatching -> Accumulating -> Fetching | Done`,
/// with early exits `Fetching -> Done` (empty page), `Routing -> Done` (nothing
/// routable) and any non-terminal phase `-> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Fetching,
    Routing,
    Dispatching,
    Accumulating,
    Done,
    Failed,
}

impl Phase {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use Phase::{Accumulating, Dispatching, Done, Failed, Fetching, Routing};
        match (self, next) {
            (Fetching, Routing | Done)
            | (Routing, Dispatching | Done)
            | (Dispatching, Accumulating)
            | (Accumulating, Fetching | Done) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetching => "fetching",
            Self::Routing => "routing",
            Self::Dispatching => "dispatching",
            Self::Accumulating => "accumulating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Results of one provider, aligned with the documents they score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResults {
    kind: ResultKind,
    results: Vec<SentimentResult>,
    document_indices: Vec<usize>,
}

impl ProviderResults {
    fn new(kind: ResultKind) -> Self {
        Self {
            kind,
            results: Vec::new(),
            document_indices: Vec::new(),
        }
    }

    /// Family of results the provider returns, known even when it scored nothing.
    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    /// Results in document order.
    pub fn results(&self) -> &[SentimentResult] {
        &self.results
    }

    /// Index into [`AccumulatedState::documents`] of each result.
    pub fn document_indices(&self) -> &[usize] {
        &self.document_indices
    }

    /// Result for a given document, if this provider scored it.
    pub fn for_document(&self, document: usize) -> Option<&SentimentResult> {
        self.document_indices
            .binary_search(&document)
            .ok()
            .map(|i| &self.results[i])
    }

    fn append(&mut self, document: usize, result: SentimentResult) {
        self.document_indices.push(document);
        self.results.push(result);
    }
}

/// Documents and results gathered over a run. Only ever appended to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccumulatedState {
    documents: Vec<String>,
    per_provider: BTreeMap<ProviderId, ProviderResults>,
    pages: usize,
}

impl AccumulatedState {
    /// Empty state for the given providers and their result families.
    pub fn with_providers(providers: impl IntoIterator<Item = (ProviderId, ResultKind)>) -> Self {
        Self {
            per_provider: providers
                .into_iter()
                .map(|(id, kind)| (id, ProviderResults::new(kind)))
                .collect(),
            ..Self::default()
        }
    }

    /// Number of routable documents across all accumulated pages.
    pub fn total_document_count(&self) -> usize {
        self.documents.len()
    }

    /// Texts of the accumulated documents in feed order.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Number of pages folded into the state.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Results of one provider (empty if the provider is unknown).
    pub fn results(&self, provider: &ProviderId) -> &[SentimentResult] {
        self.per_provider
            .get(provider)
            .map(ProviderResults::results)
            .unwrap_or_default()
    }

    /// Results of all providers keyed by id.
    pub fn per_provider(&self) -> &BTreeMap<ProviderId, ProviderResults> {
        &self.per_provider
    }

    /// Fold one page: its routable texts plus each provider's `(position, result)` pairs.
    fn append_page(
        &mut self,
        mentions: &[Mention],
        routable: &[usize],
        scored: Vec<(ProviderId, Vec<(usize, SentimentResult)>)>,
    ) {
        let base = self.documents.len();
        let mut document_at: Vec<Option<usize>> = vec![None; mentions.len()];
        for (offset, &position) in routable.iter().enumerate() {
            document_at[position] = Some(base + offset);
            self.documents.push(mentions[position].text.clone());
        }

        for (provider, results) in scored {
            let Some(slot) = self.per_provider.get_mut(&provider) else {
                continue;
            };
            for (position, result) in results {
                if let Some(document) = document_at[position] {
                    slot.append(document, result);
                }
            }
        }
        self.pages += 1;
    }
}

/// A run that stopped on an error, with whatever had been accumulated.
///
/// The partial state is for diagnostics only and must not be scored.
#[derive(Debug, Error)]
#[error("run failed while {phase}: {error}")]
pub struct RunFailure {
    /// The terminating error.
    #[source]
    pub error: PipelineError,
    /// Phase the driver was in when it failed.
    pub phase: Phase,
    /// State accumulated from pages completed before the failure.
    pub partial: AccumulatedState,
}

impl From<RunFailure> for PipelineError {
    fn from(failure: RunFailure) -> Self {
        failure.error
    }
}

/// Single-use driver that pages the feed until it is exhausted.
pub struct PaginationDriver {
    feed: Arc<dyn MentionFeed>,
    providers: Vec<ProviderConfig>,
    target_id: String,
    max_results: u32,
    lookback: Duration,
    phase: Phase,
    state: AccumulatedState,
    seen_tokens: HashSet<String>,
}

impl PaginationDriver {
    /// Create a driver for `target_id`'s mentions.
    pub fn new(
        feed: Arc<dyn MentionFeed>,
        providers: Vec<ProviderConfig>,
        target_id: impl Into<String>,
        max_results: u32,
        lookback: Duration,
    ) -> Self {
        let state = AccumulatedState::with_providers(
            providers
                .iter()
                .map(|config| (config.id(), config.provider.result_kind())),
        );
        Self {
            feed,
            providers,
            target_id: target_id.into(),
            max_results,
            lookback,
            phase: Phase::Fetching,
            state,
            seen_tokens: HashSet::new(),
        }
    }

    /// Run against the wall clock.
    pub async fn run(self, window: &TimeWindow) -> Result<AccumulatedState, RunFailure> {
        self.run_at(window, Utc::now()).await
    }

    /// Run, validating the window against `now`.
    pub async fn run_at(
        mut self,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Result<AccumulatedState, RunFailure> {
        if let Err(error) = self.validate(window, now) {
            return Err(self.fail(error));
        }

        let mut continuation_token: Option<String> = None;
        let mut page_index = 0usize;

        loop {
            let request = PageRequest {
                target_id: self.target_id.clone(),
                max_results: self.max_results,
                window_start: Some(window.start),
                window_end: Some(window.end),
                continuation_token: continuation_token.take(),
            };

            let page = match self.feed.fetch_page(&request).await {
                Ok(page) => page,
                Err(source) => {
                    return Err(self.fail(PipelineError::FeedFetch {
                        page: page_index,
                        source,
                    }))
                }
            };

            if page.mentions.is_empty() {
                tracing::info!(page = page_index, "Feed returned an empty page");
                self.transition(Phase::Done);
                break;
            }

            if let Some(token) = &page.continuation_token {
                if !self.seen_tokens.insert(token.clone()) {
                    let token = token.clone();
                    return Err(self.fail(PipelineError::PaginationLoop {
                        page: page_index,
                        token,
                    }));
                }
            }

            self.transition(Phase::Routing);
            let routable = self.routable_positions(&page);
            if routable.is_empty() {
                tracing::info!(
                    page = page_index,
                    mentions = page.mentions.len(),
                    "No mentions in a supported language"
                );
                self.transition(Phase::Done);
                break;
            }

            self.transition(Phase::Dispatching);
            let scored = match self.dispatch(&page.mentions, page_index).await {
                Ok(scored) => scored,
                Err(error) => return Err(self.fail(error)),
            };

            self.transition(Phase::Accumulating);
            self.state.append_page(&page.mentions, &routable, scored);
            tracing::info!(
                page = page_index,
                mentions = page.mentions.len(),
                routable = routable.len(),
                total = self.state.total_document_count(),
                "Accumulated page"
            );

            match page.continuation_token {
                Some(token) => {
                    self.transition(Phase::Fetching);
                    continuation_token = Some(token);
                    page_index += 1;
                }
                None => {
                    self.transition(Phase::Done);
                    break;
                }
            }
        }

        tracing::info!(
            pages = self.state.pages(),
            documents = self.state.total_document_count(),
            "Feed exhausted"
        );
        Ok(self.state)
    }

    fn validate(&self, window: &TimeWindow, now: DateTime<Utc>) -> PipelineResult<()> {
        window.validate_at(now, self.lookback)?;
        window.validate_max_results(self.max_results)?;

        if self.providers.is_empty() {
            return Err(PipelineError::InvalidProviders(
                "at least one provider is required".to_string(),
            ));
        }
        let mut ids = HashSet::new();
        for config in &self.providers {
            let id = config.id();
            if config.provider.max_batch_size() == 0 {
                return Err(PipelineError::InvalidBatchSize(0));
            }
            if !ids.insert(id.clone()) {
                return Err(PipelineError::InvalidProviders(format!(
                    "provider {id} configured more than once"
                )));
            }
        }
        Ok(())
    }

    /// Positions of mentions at least one provider can score, in feed order.
    fn routable_positions(&self, page: &Page) -> Vec<usize> {
        page.mentions
            .iter()
            .enumerate()
            .filter(|(_, m)| {
                self.providers
                    .iter()
                    .any(|p| p.supported_languages.contains(&m.language))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Send the page to every provider concurrently.
    async fn dispatch(
        &self,
        mentions: &[Mention],
        page: usize,
    ) -> PipelineResult<Vec<(ProviderId, Vec<(usize, SentimentResult)>)>> {
        try_join_all(
            self.providers
                .iter()
                .map(|config| dispatch_to_provider(config, mentions, page)),
        )
        .await
    }

    fn transition(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.phase
        );
        tracing::debug!(from = %self.phase, to = %next, "Driver transition");
        self.phase = next;
    }

    fn fail(mut self, error: PipelineError) -> RunFailure {
        let phase = self.phase;
        self.transition(Phase::Failed);
        tracing::error!(%phase, error = %error, pages = self.state.pages(), "Run aborted");
        RunFailure {
            error,
            phase,
            partial: self.state,
        }
    }
}

/// Route, batch and analyze one page for a single provider.
///
/// Batches go out sequentially; the returned pairs are sorted by page position.
async fn dispatch_to_provider(
    config: &ProviderConfig,
    mentions: &[Mention],
    page: usize,
) -> PipelineResult<(ProviderId, Vec<(usize, SentimentResult)>)> {
    let provider = config.id();
    let fetch_error = |source: ClientError| PipelineError::ProviderFetch {
        page,
        provider: provider.clone(),
        source,
    };

    let buckets = router::route_positions(mentions, &config.supported_languages);
    let mut scored = Vec::new();

    for (language, positions) in &buckets {
        for batch in batcher::chunk(positions, config.provider.max_batch_size())? {
            let texts: Vec<String> = batch.iter().map(|&i| mentions[i].text.clone()).collect();
            let results = config
                .provider
                .analyze(&texts, Some(language))
                .await
                .map_err(fetch_error)?;

            if results.len() != texts.len() {
                return Err(fetch_error(ClientError::MalformedResponse(format!(
                    "expected {} results, got {}",
                    texts.len(),
                    results.len()
                ))));
            }
            scored.extend(batch.iter().copied().zip(results));
        }
        tracing::debug!(%provider, %language, documents = positions.len(), "Analyzed bucket");
    }

    scored.sort_by_key(|(position, _)| *position);
    Ok((provider, scored))
}
