//! AWS Comprehend `BatchDetectSentiment` provider.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::ClientError;
use crate::nps::ThresholdConfig;

use super::provider::SentimentProvider;
use super::sigv4::{self, AwsCredentials, SigningRequest};
use super::types::{ProviderId, ResultKind, SentimentLabel, SentimentResult};

/// Provider id under which Comprehend results are accumulated.
pub const COMPREHEND_PROVIDER_ID: &str = "aws-comprehend";

/// Maximum documents per `BatchDetectSentiment` call.
pub const COMPREHEND_MAX_BATCH: usize = 25;

/// Languages supported by Comprehend sentiment detection.
pub const COMPREHEND_LANGUAGES: &[&str] = &[
    "en", "es", "fr", "de", "it", "pt", "ar", "hi", "ja", "ko", "zh", "zh-TW",
];

const SERVICE: &str = "comprehend";
const TARGET: &str = "Comprehend_20171127.BatchDetectSentiment";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Serialize)]
struct BatchDetectSentimentRequest<'a> {
    #[serde(rename = "TextList")]
    text_list: &'a [String],
    #[serde(rename = "LanguageCode")]
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchDetectSentimentResponse {
    #[serde(rename = "ResultList", default)]
    result_list: Vec<BatchItemResult>,
    #[serde(rename = "ErrorList", default)]
    error_list: Vec<BatchItemError>,
}

#[derive(Debug, Deserialize)]
struct BatchItemResult {
    #[serde(rename = "Index")]
    index: usize,
    #[serde(rename = "Sentiment")]
    sentiment: String,
    #[serde(rename = "SentimentScore")]
    sentiment_score: SentimentScore,
}

#[derive(Debug, Deserialize)]
struct SentimentScore {
    #[serde(rename = "Positive", default)]
    positive: f64,
    #[serde(rename = "Negative", default)]
    negative: f64,
    #[serde(rename = "Neutral", default)]
    neutral: f64,
    #[serde(rename = "Mixed", default)]
    mixed: f64,
}

#[derive(Debug, Deserialize)]
struct BatchItemError {
    #[serde(rename = "Index")]
    index: usize,
    #[serde(rename = "ErrorCode", default)]
    error_code: String,
    #[serde(rename = "ErrorMessage", default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct ComprehendErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// AWS Comprehend client.
pub struct ComprehendProvider {
    client: Client,
    credentials: AwsCredentials,
    region: String,
    endpoint: Url,
}

impl ComprehendProvider {
    /// Create a provider for the regional public endpoint.
    pub fn new(
        region: impl Into<String>,
        credentials: AwsCredentials,
    ) -> Result<Self, ClientError> {
        let region = region.into();
        let endpoint = Url::parse(&format!("https://comprehend.{region}.amazonaws.com/"))
            .map_err(|e| ClientError::MalformedResponse(format!("invalid region {region}: {e}")))?;
        Self::with_endpoint(region, credentials, endpoint)
    }

    /// Create a provider targeting a custom endpoint (VPC endpoints, tests).
    pub fn with_endpoint(
        region: impl Into<String>,
        credentials: AwsCredentials,
        endpoint: Url,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            client,
            credentials,
            region: region.into(),
            endpoint,
        })
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

#[async_trait]
impl SentimentProvider for ComprehendProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(COMPREHEND_PROVIDER_ID)
    }

    fn result_kind(&self) -> ResultKind {
        ResultKind::Categorical
    }

    fn max_batch_size(&self) -> usize {
        COMPREHEND_MAX_BATCH
    }

    fn default_languages(&self) -> HashSet<String> {
        COMPREHEND_LANGUAGES.iter().map(ToString::to_string).collect()
    }

    fn default_thresholds(&self) -> ThresholdConfig {
        ThresholdConfig::categorical_strict()
    }

    async fn analyze(
        &self,
        batch: &[String],
        language: Option<&str>,
    ) -> Result<Vec<SentimentResult>, ClientError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::to_vec(&BatchDetectSentimentRequest {
            text_list: batch,
            language_code: language.unwrap_or("en"),
        })?;

        let host = self.host();
        let signed = sigv4::sign(
            &SigningRequest {
                host: &host,
                region: &self.region,
                service: SERVICE,
                target: TARGET,
                content_type: CONTENT_TYPE,
                payload: &body,
            },
            &self.credentials,
            Utc::now(),
        )?;

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", TARGET)
            .header("X-Amz-Date", &signed.amz_date)
            .header("Authorization", &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("X-Amz-Security-Token", token);
        }

        tracing::debug!(documents = batch.len(), ?language, "Calling Comprehend");
        let response = request.body(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ComprehendErrorBody>(&text)
                .ok()
                .and_then(|b| match (b.error_type, b.message) {
                    (Some(t), Some(m)) => Some(format!("{t}: {m}")),
                    (t, m) => t.or(m),
                })
                .unwrap_or(text);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: BatchDetectSentimentResponse =
            serde_json::from_slice(&response.bytes().await?)?;
        into_results(parsed, batch.len())
    }
}

/// Validate a batch response and order its results by document index.
fn into_results(
    response: BatchDetectSentimentResponse,
    expected: usize,
) -> Result<Vec<SentimentResult>, ClientError> {
    if let Some(first) = response.error_list.first() {
        return Err(ClientError::MalformedResponse(format!(
            "{} of {expected} documents failed, first at index {}: {} {}",
            response.error_list.len(),
            first.index,
            first.error_code,
            first.error_message
        )));
    }
    if response.result_list.len() != expected {
        return Err(ClientError::MalformedResponse(format!(
            "expected {expected} results, got {}",
            response.result_list.len()
        )));
    }

    let mut slots: Vec<Option<SentimentResult>> = vec![None; expected];
    for item in response.result_list {
        let label = SentimentLabel::parse(&item.sentiment).ok_or_else(|| {
            ClientError::MalformedResponse(format!("unknown sentiment {}", item.sentiment))
        })?;
        let slot = slots.get_mut(item.index).ok_or_else(|| {
            ClientError::MalformedResponse(format!("result index {} out of range", item.index))
        })?;
        *slot = Some(SentimentResult::Categorical {
            label,
            positive: item.sentiment_score.positive,
            negative: item.sentiment_score.negative,
            neutral: item.sentiment_score.neutral,
            mixed: item.sentiment_score.mixed,
        });
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| {
                ClientError::MalformedResponse(format!("missing result for index {i}"))
            })
        })
        .collect()
}
