//! Google Cloud Natural Language sentiment provider.

use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::ClientError;
use crate::nps::ThresholdConfig;

use super::provider::SentimentProvider;
use super::types::{ProviderId, ResultKind, SentimentResult};

const GOOGLE_NLP_API_BASE: &str = "https://language.googleapis.com/v1";

/// Provider id under which Google NLP results are accumulated.
pub const GOOGLE_PROVIDER_ID: &str = "google-nlp";

/// Documents analysed concurrently per batch.
pub const GOOGLE_MAX_BATCH: usize = 25;

/// Languages supported by Google sentiment analysis.
pub const GOOGLE_LANGUAGES: &[&str] = &[
    "ar", "de", "en", "es", "fr", "id", "it", "ja", "ko", "nl", "pl", "pt", "th", "tr", "vi",
    "zh", "zh-TW",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentRequest<'a> {
    document: Document<'a>,
    encoding_type: &'static str,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    #[serde(rename = "type")]
    doc_type: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeSentimentResponse {
    document_sentiment: Option<DocumentSentiment>,
}

#[derive(Debug, Deserialize)]
struct DocumentSentiment {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    magnitude: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    status: String,
    message: String,
}

/// Google NLP client authenticated with an API key.
pub struct GoogleNlpProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GoogleNlpProvider {
    /// Create a provider for the public API.
    pub fn new(api_key: String) -> Result<Self, ClientError> {
        Self::with_base_url(api_key, GOOGLE_NLP_API_BASE)
    }

    /// Create a provider targeting a custom base URL.
    pub fn with_base_url(
        api_key: String,
        base_url: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn analyze_one(
        &self,
        content: &str,
        language: Option<&str>,
    ) -> Result<SentimentResult, ClientError> {
        let request = AnalyzeSentimentRequest {
            document: Document {
                doc_type: "PLAIN_TEXT",
                content,
                language,
            },
            encoding_type: "UTF8",
        };

        let response = self
            .client
            .post(format!("{}/documents:analyzeSentiment", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GoogleErrorResponse>(&text)
                .map(|e| {
                    if e.error.status.is_empty() {
                        e.error.message
                    } else {
                        format!("{}: {}", e.error.status, e.error.message)
                    }
                })
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AnalyzeSentimentResponse = serde_json::from_slice(&response.bytes().await?)?;
        let sentiment = parsed.document_sentiment.ok_or_else(|| {
            ClientError::MalformedResponse("response has no documentSentiment".to_string())
        })?;

        Ok(SentimentResult::polar(sentiment.score, sentiment.magnitude))
    }
}

#[async_trait]
impl SentimentProvider for GoogleNlpProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(GOOGLE_PROVIDER_ID)
    }

    fn result_kind(&self) -> ResultKind {
        ResultKind::Continuous
    }

    fn max_batch_size(&self) -> usize {
        GOOGLE_MAX_BATCH
    }

    fn default_languages(&self) -> HashSet<String> {
        GOOGLE_LANGUAGES.iter().map(ToString::to_string).collect()
    }

    fn default_thresholds(&self) -> ThresholdConfig {
        ThresholdConfig::continuous()
    }

    async fn analyze(
        &self,
        batch: &[String],
        language: Option<&str>,
    ) -> Result<Vec<SentimentResult>, ClientError> {
        tracing::debug!(documents = batch.len(), ?language, "Calling Google NLP");
        // try_join_all yields results in input order regardless of completion order
        try_join_all(batch.iter().map(|doc| self.analyze_one(doc, language))).await
    }
}
