//! Brand monitor crate for Twitter/X mention sentiment and NPS.
//!
//! This crate provides:
//! - A paginated mention feed over the Twitter/X API v2
//! - Per-language routing and fixed-size batching of mentions
//! - Sentiment scoring via AWS Comprehend and Google Cloud Natural Language
//! - Net Promoter Score per provider over a time window
//! - CSV export of per-mention sentiments

pub mod config;
pub mod error;
pub mod nps;
pub mod pipeline;
pub mod report;
pub mod sentiment;
pub mod twitter;

// Re-export main types
pub use error::{ClientError, PipelineError, PipelineResult};
pub use nps::{NpsResult, ThresholdConfig};
pub use pipeline::{
    run_pipeline, AccumulatedState, Pipeline, PipelineConfig, PipelineReport, RunFailure,
    TimeWindow,
};
pub use sentiment::{ProviderConfig, ProviderId, ResultKind, SentimentProvider, SentimentResult};
pub use twitter::{Mention, MentionFeed, Page, PageRequest};
