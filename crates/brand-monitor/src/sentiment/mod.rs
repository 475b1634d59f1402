//! Sentiment-analysis providers.
//!
//! Two provider families are supported:
//! - categorical (AWS Comprehend): a label plus per-label confidence
//! - continuous (Google NLP): a signed polarity plus magnitude

mod comprehend;
mod google;
mod provider;
pub mod sigv4;
mod types;

pub use comprehend::{
    ComprehendProvider, COMPREHEND_LANGUAGES, COMPREHEND_MAX_BATCH, COMPREHEND_PROVIDER_ID,
};
pub use google::{GoogleNlpProvider, GOOGLE_LANGUAGES, GOOGLE_MAX_BATCH, GOOGLE_PROVIDER_ID};
pub use provider::{ProviderConfig, SentimentProvider};
pub use sigv4::AwsCredentials;
pub use types::{ProviderId, ResultKind, SentimentLabel, SentimentResult};
