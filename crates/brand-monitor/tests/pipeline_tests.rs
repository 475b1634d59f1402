//! Integration tests for the mention pipeline.
//!
//! These tests drive the pagination driver and the full pipeline with
//! in-memory feeds and sentiment providers.

use async_trait::async_trait;
use brand_monitor::error::{ClientError, PipelineError};
use brand_monitor::nps::ThresholdConfig;
use brand_monitor::pipeline::{
    default_lookback, PaginationDriver, Phase, Pipeline, PipelineConfig, TimeWindow,
};
use brand_monitor::report;
use brand_monitor::sentiment::{
    ProviderConfig, ProviderId, ResultKind, SentimentLabel, SentimentProvider, SentimentResult,
};
use brand_monitor::twitter::{Mention, MentionFeed, Page, PageRequest};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// =============================================================================
// Stub Feed
// =============================================================================

/// Feed that replays a fixed script of pages or errors.
#[derive(Default)]
struct ScriptedFeed {
    script: Mutex<VecDeque<Result<Page, u16>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedFeed {
    fn new(script: Vec<Result<Page, u16>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::default(),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn tokens(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.continuation_token.clone())
            .collect()
    }
}

#[async_trait]
impl MentionFeed for ScriptedFeed {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(status)) => Err(ClientError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Ok(Page::default()),
        }
    }
}

/// Feed that always hands back the same continuation token.
#[derive(Default)]
struct StuckFeed {
    calls: AtomicUsize,
}

#[async_trait]
impl MentionFeed for StuckFeed {
    async fn fetch_page(&self, _request: &PageRequest) -> Result<Page, ClientError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Page::new(
            vec![Mention::new(n.to_string(), format!("mention {n}"), "en")],
            Some("t1".to_string()),
        ))
    }
}

// =============================================================================
// Stub Provider
// =============================================================================

/// Provider that scores texts from a lookup table.
struct StubProvider {
    id: &'static str,
    max_batch: usize,
    languages: &'static [&'static str],
    kind: ResultKind,
    scores: HashMap<String, SentimentResult>,
    slow: HashSet<String>,
    failing: HashSet<String>,
    batches: Mutex<Vec<(Option<String>, Vec<String>)>>,
}

impl StubProvider {
    fn new(id: &'static str, max_batch: usize, languages: &'static [&'static str]) -> Self {
        Self {
            id,
            max_batch,
            languages,
            kind: ResultKind::Categorical,
            scores: HashMap::new(),
            slow: HashSet::new(),
            failing: HashSet::new(),
            batches: Mutex::default(),
        }
    }

    fn continuous(mut self) -> Self {
        self.kind = ResultKind::Continuous;
        self
    }

    fn score(mut self, text: &str, result: SentimentResult) -> Self {
        self.scores.insert(text.to_string(), result);
        self
    }

    fn slow_on(mut self, text: &str) -> Self {
        self.slow.insert(text.to_string());
        self
    }

    fn fail_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, b)| b.len())
            .collect()
    }

    fn languages_seen(&self) -> Vec<Option<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|(l, _)| l.clone())
            .collect()
    }
}

#[async_trait]
impl SentimentProvider for StubProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(self.id)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn default_languages(&self) -> HashSet<String> {
        self.languages.iter().map(ToString::to_string).collect()
    }

    fn default_thresholds(&self) -> ThresholdConfig {
        ThresholdConfig::categorical_strict()
    }

    fn result_kind(&self) -> ResultKind {
        self.kind
    }

    async fn analyze(
        &self,
        batch: &[String],
        language: Option<&str>,
    ) -> Result<Vec<SentimentResult>, ClientError> {
        self.batches
            .lock()
            .unwrap()
            .push((language.map(ToString::to_string), batch.to_vec()));

        if batch.iter().any(|t| self.slow.contains(t)) {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        if batch.iter().any(|t| self.failing.contains(t)) {
            return Err(ClientError::Api {
                status: 500,
                message: "provider down".to_string(),
            });
        }

        Ok(batch
            .iter()
            .map(|t| {
                self.scores
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| SentimentResult::labelled(SentimentLabel::Neutral, 0.9))
            })
            .collect())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn window() -> TimeWindow {
    TimeWindow::new(now() - Duration::days(1), now() - Duration::minutes(1))
}

fn mentions(items: &[(&str, &str)]) -> Vec<Mention> {
    items
        .iter()
        .enumerate()
        .map(|(i, (text, lang))| Mention::new(i.to_string(), *text, *lang))
        .collect()
}

fn page(items: &[(&str, &str)], token: Option<&str>) -> Result<Page, u16> {
    Ok(Page::new(mentions(items), token.map(ToString::to_string)))
}

fn driver(feed: Arc<dyn MentionFeed>, providers: Vec<ProviderConfig>) -> PaginationDriver {
    PaginationDriver::new(feed, providers, "42", 100, default_lookback())
}

fn config(provider: &Arc<StubProvider>) -> ProviderConfig {
    ProviderConfig::new(provider.clone())
}

fn polarities(results: &[SentimentResult]) -> Vec<f64> {
    results
        .iter()
        .map(|r| match r {
            SentimentResult::Continuous { polarity, .. } => *polarity,
            SentimentResult::Categorical { .. } => f64::NAN,
        })
        .collect()
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn test_follows_tokens_until_exhausted() {
    let feed = ScriptedFeed::new(vec![
        page(&[("a", "en")], Some("t1")),
        page(&[("b", "en")], Some("t2")),
        page(&[("c", "en")], None),
    ]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let state = driver(feed.clone(), vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap();

    assert_eq!(feed.calls(), 3);
    assert_eq!(
        feed.tokens(),
        vec![None, Some("t1".to_string()), Some("t2".to_string())]
    );
    assert_eq!(state.pages(), 3);
    assert_eq!(state.total_document_count(), 3);
}

#[tokio::test]
async fn test_repeated_token_is_a_loop() {
    let feed = Arc::new(StuckFeed::default());
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let failure = driver(feed.clone(), vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap_err();

    match &failure.error {
        PipelineError::PaginationLoop { page, token } => {
            assert_eq!(*page, 1);
            assert_eq!(token, "t1");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(feed.calls.load(Ordering::SeqCst), 2);
    // Only the first page was folded in.
    assert_eq!(failure.partial.pages(), 1);
    assert_eq!(failure.partial.total_document_count(), 1);
}

#[tokio::test]
async fn test_empty_first_page_terminates() {
    let feed = ScriptedFeed::new(vec![page(&[], Some("ignored"))]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let state = driver(feed.clone(), vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap();

    assert_eq!(feed.calls(), 1);
    assert_eq!(state.total_document_count(), 0);
    assert!(provider.batch_sizes().is_empty());
}

#[tokio::test]
async fn test_unroutable_page_terminates() {
    let feed = ScriptedFeed::new(vec![
        page(&[("a", "en")], Some("t1")),
        page(&[("x", "xx"), ("y", "und")], Some("t2")),
        page(&[("b", "en")], None),
    ]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let state = driver(feed.clone(), vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap();

    assert_eq!(feed.calls(), 2);
    assert_eq!(state.documents(), &["a".to_string()]);
}

// =============================================================================
// Routing, batching and ordering
// =============================================================================

#[tokio::test]
async fn test_results_keep_feed_order_across_pages_and_languages() {
    let feed = ScriptedFeed::new(vec![
        page(&[("A", "fr"), ("B", "en")], Some("t1")),
        page(&[("C", "en")], None),
    ]);
    let provider = Arc::new(
        StubProvider::new("stub", 25, &["en", "fr"])
            .continuous()
            .score("A", SentimentResult::polar(0.1, 0.0))
            .score("B", SentimentResult::polar(0.2, 0.0))
            .score("C", SentimentResult::polar(0.3, 0.0))
            .slow_on("A"),
    );

    let state = driver(feed, vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap();

    let id = ProviderId::new("stub");
    assert_eq!(polarities(state.results(&id)), vec![0.1, 0.2, 0.3]);
    assert_eq!(
        state.documents(),
        &["A".to_string(), "B".to_string(), "C".to_string()]
    );
    // Buckets go out in language order with their language code.
    assert_eq!(
        provider.languages_seen(),
        vec![
            Some("en".to_string()),
            Some("fr".to_string()),
            Some("en".to_string())
        ]
    );
}

#[tokio::test]
async fn test_large_bucket_is_split_into_batches() {
    let texts: Vec<String> = (0..30).map(|i| format!("doc{i}")).collect();
    let items: Vec<(&str, &str)> = texts.iter().map(|t| (t.as_str(), "en")).collect();
    let feed = ScriptedFeed::new(vec![page(&items, None)]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let state = driver(feed, vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap();

    assert_eq!(provider.batch_sizes(), vec![25, 5]);
    assert_eq!(state.results(&ProviderId::new("stub")).len(), 30);
}

#[tokio::test]
async fn test_each_provider_routes_its_own_languages() {
    let feed = ScriptedFeed::new(vec![page(
        &[("hello", "en"), ("hallo", "de"), ("???", "xx")],
        None,
    )]);
    let english = Arc::new(StubProvider::new("english", 25, &["en"]));
    let both = Arc::new(StubProvider::new("both", 25, &["en", "de"]));

    let state = driver(feed, vec![config(&english), config(&both)])
        .run_at(&window(), now())
        .await
        .unwrap();

    // "xx" is unsupported everywhere and dropped; "de" is kept for the provider that handles it.
    assert_eq!(state.total_document_count(), 2);
    assert_eq!(state.results(&ProviderId::new("english")).len(), 1);
    assert_eq!(state.results(&ProviderId::new("both")).len(), 2);
    assert_eq!(
        state.per_provider()[&ProviderId::new("english")].document_indices(),
        &[0]
    );
}

#[tokio::test]
async fn test_configured_languages_override_defaults() {
    let feed = ScriptedFeed::new(vec![page(&[("bonjour", "fr"), ("hi", "en")], None)]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let state = driver(feed, vec![config(&provider).with_languages(["fr"])])
        .run_at(&window(), now())
        .await
        .unwrap();

    assert_eq!(state.documents(), &["bonjour".to_string()]);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_invalid_window_fails_before_any_fetch() {
    let feed = ScriptedFeed::new(vec![page(&[("a", "en")], None)]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));
    let backwards = TimeWindow::new(now() - Duration::minutes(1), now() - Duration::hours(1));

    let failure = driver(feed.clone(), vec![config(&provider)])
        .run_at(&backwards, now())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, PipelineError::InvalidWindow { .. }));
    assert!(failure.error.is_validation());
    assert_eq!(failure.phase, Phase::Fetching);
    assert_eq!(feed.calls(), 0);
}

#[tokio::test]
async fn test_window_beyond_lookback_is_rejected() {
    let feed = ScriptedFeed::new(vec![]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));
    let stale = TimeWindow::new(now() - Duration::days(8), now() - Duration::days(1));

    let failure = driver(feed.clone(), vec![config(&provider)])
        .run_at(&stale, now())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, PipelineError::InvalidWindow { .. }));
    assert_eq!(feed.calls(), 0);
}

#[tokio::test]
async fn test_invalid_max_results_fails_before_any_fetch() {
    let feed = ScriptedFeed::new(vec![]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let failure = PaginationDriver::new(
        feed.clone(),
        vec![config(&provider)],
        "42",
        4,
        default_lookback(),
    )
    .run_at(&window(), now())
    .await
    .unwrap_err();

    match &failure.error {
        PipelineError::InvalidWindow { reason, .. } => {
            assert_eq!(reason, "max results 4 outside 5..=100");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(failure.error.is_validation());
    assert_eq!(feed.calls(), 0);
}

#[tokio::test]
async fn test_zero_batch_size_is_rejected() {
    let feed = ScriptedFeed::new(vec![]);
    let provider = Arc::new(StubProvider::new("stub", 0, &["en"]));

    let failure = driver(feed.clone(), vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, PipelineError::InvalidBatchSize(0)));
    assert_eq!(feed.calls(), 0);
}

#[tokio::test]
async fn test_duplicate_providers_are_rejected() {
    let feed = ScriptedFeed::new(vec![]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let failure = driver(feed.clone(), vec![config(&provider), config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap_err();

    assert!(matches!(failure.error, PipelineError::InvalidProviders(_)));
    assert_eq!(feed.calls(), 0);
}

#[tokio::test]
async fn test_feed_failure_carries_page_and_partial_state() {
    let feed = ScriptedFeed::new(vec![
        page(&[("a", "en"), ("b", "en")], Some("t1")),
        Err(503),
    ]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let failure = driver(feed, vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap_err();

    match &failure.error {
        PipelineError::FeedFetch { page, source } => {
            assert_eq!(*page, 1);
            assert!(matches!(source, ClientError::Api { status: 503, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.phase, Phase::Fetching);
    assert_eq!(failure.partial.total_document_count(), 2);
}

#[tokio::test]
async fn test_provider_failure_carries_page_and_provider() {
    let feed = ScriptedFeed::new(vec![
        page(&[("fine", "en")], Some("t1")),
        page(&[("boom", "en")], None),
    ]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]).fail_on("boom"));

    let failure = driver(feed, vec![config(&provider)])
        .run_at(&window(), now())
        .await
        .unwrap_err();

    match &failure.error {
        PipelineError::ProviderFetch { page, provider, .. } => {
            assert_eq!(*page, 1);
            assert_eq!(provider.as_str(), "stub");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.phase, Phase::Dispatching);
    assert_eq!(failure.partial.documents(), &["fine".to_string()]);
}

// =============================================================================
// Full pipeline
// =============================================================================

fn recent_window() -> TimeWindow {
    let end = Utc::now() - Duration::minutes(1);
    TimeWindow::new(end - Duration::hours(6), end)
}

#[tokio::test]
async fn test_pipeline_scores_categorical_provider() {
    let feed = ScriptedFeed::new(vec![page(
        &[("love it", "en"), ("hate it", "en"), ("meh", "en")],
        None,
    )]);
    let provider = Arc::new(
        StubProvider::new("aws", 25, &["en"])
            .score(
                "love it",
                SentimentResult::labelled(SentimentLabel::Positive, 0.9),
            )
            .score(
                "hate it",
                SentimentResult::labelled(SentimentLabel::Negative, 0.85),
            )
            .score("meh", SentimentResult::labelled(SentimentLabel::Neutral, 0.99)),
    );

    let pipeline = Pipeline::new(
        PipelineConfig::new("42"),
        feed,
        vec![config(&provider)],
    );
    let report = pipeline.run(&recent_window()).await.unwrap();

    let nps = &report.nps[&ProviderId::new("aws")];
    assert_eq!(nps.promoters_count, 1);
    assert_eq!(nps.detractors_count, 1);
    assert_eq!(nps.total_documents, 3);
    assert!(nps.score.abs() < 1e-9);
}

#[tokio::test]
async fn test_pipeline_uses_total_documents_as_denominator() {
    let feed = ScriptedFeed::new(vec![page(
        &[("great", "en"), ("super", "de"), ("ok", "en"), ("fine", "en")],
        None,
    )]);
    let english = Arc::new(
        StubProvider::new("english", 25, &["en"])
            .continuous()
            .score("great", SentimentResult::polar(0.9, 0.9)),
    );
    let german = Arc::new(
        StubProvider::new("german", 25, &["de"])
            .continuous()
            .score("super", SentimentResult::polar(0.9, 0.9)),
    );

    let pipeline = Pipeline::new(
        PipelineConfig::new("42"),
        feed,
        vec![
            config(&english).with_thresholds(ThresholdConfig::continuous()),
            config(&german).with_thresholds(ThresholdConfig::continuous()),
        ],
    );
    let report = pipeline.run(&recent_window()).await.unwrap();

    // Four routable documents; each provider only scored its own language.
    assert!((report.nps[&ProviderId::new("english")].score - 25.0).abs() < 1e-9);
    assert!((report.nps[&ProviderId::new("german")].score - 25.0).abs() < 1e-9);
    assert_eq!(report.nps[&ProviderId::new("german")].total_documents, 4);
}

#[tokio::test]
async fn test_pipeline_with_no_documents_is_division_by_zero() {
    let feed = ScriptedFeed::new(vec![page(&[], None)]);
    let provider = Arc::new(StubProvider::new("stub", 25, &["en"]));

    let pipeline = Pipeline::new(PipelineConfig::new("42"), feed, vec![config(&provider)]);
    let err = pipeline.run(&recent_window()).await.unwrap_err();

    assert!(matches!(err, PipelineError::DivisionByZero));
}

#[tokio::test]
async fn test_run_pipeline_returns_scores_per_provider() {
    let feed = ScriptedFeed::new(vec![page(&[("nice", "en")], None)]);
    let provider = Arc::new(
        StubProvider::new("stub", 25, &["en"])
            .score("nice", SentimentResult::labelled(SentimentLabel::Positive, 0.95)),
    );
    let window = recent_window();

    let scores = brand_monitor::run_pipeline(
        feed,
        "42",
        window.start,
        window.end,
        vec![config(&provider)],
    )
    .await
    .unwrap();

    assert_eq!(scores.len(), 1);
    assert!((scores[&ProviderId::new("stub")].score - 100.0).abs() < 1e-9);
}

// =============================================================================
// Report
// =============================================================================

#[tokio::test]
async fn test_csv_report_leaves_unscored_cells_empty() {
    let feed = ScriptedFeed::new(vec![page(&[("hi", "en"), ("salut", "fr")], None)]);
    let aws = Arc::new(
        StubProvider::new("aws", 25, &["en"])
            .score("hi", SentimentResult::labelled(SentimentLabel::Positive, 0.5)),
    );
    let google = Arc::new(
        StubProvider::new("google", 25, &["en", "fr"])
            .continuous()
            .score("hi", SentimentResult::polar(0.25, 0.5))
            .score("salut", SentimentResult::polar(-0.5, 1.0)),
    );

    let state = driver(feed, vec![config(&aws), config(&google)])
        .run_at(&window(), now())
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = report::write_report(dir.path(), &state, now()).unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();

    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "mention_sentiments_report_1700000000.csv"
    );
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "text,aws_label,aws_positive,aws_negative,aws_neutral,aws_mixed,\
             google_polarity,google_magnitude",
            "hi,POSITIVE,0.5,0,0,0,0.25,0.5",
            "salut,,,,,,-0.5,1",
        ]
    );
}

#[tokio::test]
async fn test_csv_report_keeps_columns_of_provider_without_results() {
    let feed = ScriptedFeed::new(vec![page(&[("hallo", "nl"), ("goed", "nl")], None)]);
    let aws = Arc::new(StubProvider::new("aws-comprehend", 25, &["en"]));
    let google = Arc::new(
        StubProvider::new("google-nlp", 25, &["nl"])
            .continuous()
            .score("hallo", SentimentResult::polar(0.5, 0.5))
            .score("goed", SentimentResult::polar(0.75, 1.0)),
    );

    let state = driver(feed, vec![config(&aws), config(&google)])
        .run_at(&window(), now())
        .await
        .unwrap();
    assert!(state.results(&ProviderId::new("aws-comprehend")).is_empty());

    let mut out = Vec::new();
    report::write_csv(&mut out, &state).unwrap();
    let csv = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "text,aws-comprehend_label,aws-comprehend_positive,aws-comprehend_negative,\
             aws-comprehend_neutral,aws-comprehend_mixed,google-nlp_polarity,google-nlp_magnitude",
            "hallo,,,,,,0.5,0.5",
            "goed,,,,,,0.75,1",
        ]
    );
    assert!(aws.batch_sizes().is_empty());
}
