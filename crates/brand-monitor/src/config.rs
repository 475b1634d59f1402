//! Configuration for the feed and sentiment providers.
//!
//! Every setting is named by its environment variable. Loaders read through a
//! lookup function, so the CLI can pass values it resolved from flags or the
//! environment. Nothing here is global: callers build explicit config values
//! and hand them to the pipeline.

use anyhow::{bail, Context, Result};
use std::str::FromStr;
use std::sync::Arc;

use crate::nps::ThresholdConfig;
use crate::sentiment::{AwsCredentials, ComprehendProvider, GoogleNlpProvider, ProviderConfig};
use crate::twitter::TwitterClient;

pub const TWITTER_BEARER_TOKEN_ENV: &str = "BM_TWITTER_BEARER_TOKEN";
pub const AWS_REGION_ENV: &str = "BM_AWS_COMPREHEND_REGION";
pub const AWS_ACCESS_KEY_ID_ENV: &str = "BM_AWS_COMPREHEND_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY_ENV: &str = "BM_AWS_COMPREHEND_SECRET_ACCESS_KEY";
pub const AWS_SESSION_TOKEN_ENV: &str = "BM_AWS_COMPREHEND_SESSION_TOKEN";
pub const AWS_POSITIVE_THRESHOLD_ENV: &str = "BM_AWS_POSITIVE_THRESHOLD";
pub const AWS_NEGATIVE_THRESHOLD_ENV: &str = "BM_AWS_NEGATIVE_THRESHOLD";
pub const GOOGLE_API_KEY_ENV: &str = "BM_GOOGLE_NLP_API_KEY";
pub const GOOGLE_POSITIVE_THRESHOLD_ENV: &str = "BM_GOOGLE_POSITIVE_THRESHOLD";
pub const GOOGLE_NEGATIVE_THRESHOLD_ENV: &str = "BM_GOOGLE_NEGATIVE_THRESHOLD";

/// Sentiment backends selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// AWS Comprehend (categorical).
    Aws,
    /// Google Cloud Natural Language (continuous).
    Google,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "aws" | "comprehend" | "aws-comprehend" => Ok(Self::Aws),
            "google" | "gcp" | "google-nlp" => Ok(Self::Google),
            other => bail!("Unknown sentiment provider: {other} (expected aws or google)"),
        }
    }
}

/// Parse a comma-separated provider list such as `aws,google`.
pub fn parse_provider_list(value: &str) -> Result<Vec<ProviderKind>> {
    let mut kinds = Vec::new();
    for part in value.split(',').filter(|p| !p.trim().is_empty()) {
        let kind: ProviderKind = part.parse()?;
        if kinds.contains(&kind) {
            bail!("Provider {} listed more than once", part.trim());
        }
        kinds.push(kind);
    }
    if kinds.is_empty() {
        bail!("At least one sentiment provider is required");
    }
    Ok(kinds)
}

/// Twitter API credentials.
#[derive(Clone)]
pub struct TwitterConfig {
    /// App bearer token.
    pub bearer_token: String,
}

impl TwitterConfig {
    /// Load from `BM_TWITTER_BEARER_TOKEN`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            bearer_token: required(&lookup, TWITTER_BEARER_TOKEN_ENV)?,
        })
    }

    /// Build the API client.
    pub fn client(&self) -> Result<TwitterClient> {
        TwitterClient::new(self.bearer_token.clone()).context("Failed to create Twitter client")
    }
}

impl std::fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("bearer_token", &"***")
            .finish()
    }
}

/// AWS Comprehend settings.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub credentials: AwsCredentials,
    pub thresholds: ThresholdConfig,
}

impl AwsConfig {
    /// Load the `BM_AWS_*` settings.
    ///
    /// # Required Settings
    /// - `BM_AWS_COMPREHEND_REGION`
    /// - `BM_AWS_COMPREHEND_ACCESS_KEY_ID`
    /// - `BM_AWS_COMPREHEND_SECRET_ACCESS_KEY`
    ///
    /// # Optional Settings
    /// - `BM_AWS_COMPREHEND_SESSION_TOKEN`
    /// - `BM_AWS_POSITIVE_THRESHOLD` / `BM_AWS_NEGATIVE_THRESHOLD` (default: 0.8 / 0.8)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let credentials = AwsCredentials {
            access_key_id: required(&lookup, AWS_ACCESS_KEY_ID_ENV)?,
            secret_access_key: required(&lookup, AWS_SECRET_ACCESS_KEY_ENV)?,
            session_token: lookup(AWS_SESSION_TOKEN_ENV).filter(|t| !t.is_empty()),
        };
        let thresholds = categorical_thresholds(
            threshold(&lookup, AWS_POSITIVE_THRESHOLD_ENV)?,
            threshold(&lookup, AWS_NEGATIVE_THRESHOLD_ENV)?,
        )?;
        Ok(Self {
            region: required(&lookup, AWS_REGION_ENV)?,
            credentials,
            thresholds,
        })
    }

    /// Build the provider with these thresholds.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let provider = ComprehendProvider::new(self.region.clone(), self.credentials.clone())
            .context("Failed to create Comprehend client")?;
        Ok(ProviderConfig::new(Arc::new(provider)).with_thresholds(self.thresholds))
    }
}

/// Google NLP settings.
#[derive(Clone)]
pub struct GoogleConfig {
    pub api_key: String,
    pub thresholds: ThresholdConfig,
}

impl GoogleConfig {
    /// Load the `BM_GOOGLE_*` settings.
    ///
    /// # Required Settings
    /// - `BM_GOOGLE_NLP_API_KEY`
    ///
    /// # Optional Settings
    /// - `BM_GOOGLE_POSITIVE_THRESHOLD` / `BM_GOOGLE_NEGATIVE_THRESHOLD` (default: 0.7 / -0.7)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let thresholds = polarity_thresholds(
            threshold(&lookup, GOOGLE_POSITIVE_THRESHOLD_ENV)?,
            threshold(&lookup, GOOGLE_NEGATIVE_THRESHOLD_ENV)?,
        )?;
        Ok(Self {
            api_key: required(&lookup, GOOGLE_API_KEY_ENV)?,
            thresholds,
        })
    }

    /// Build the provider with these thresholds.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let provider = GoogleNlpProvider::new(self.api_key.clone())
            .context("Failed to create Google NLP client")?;
        Ok(ProviderConfig::new(Arc::new(provider)).with_thresholds(self.thresholds))
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &"***")
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

/// Categorical thresholds, falling back to the strict operating point.
fn categorical_thresholds(
    positive: Option<f64>,
    negative: Option<f64>,
) -> Result<ThresholdConfig> {
    let default = ThresholdConfig::categorical_strict();
    Ok(ThresholdConfig::categorical(
        positive.unwrap_or(default.positive),
        negative.unwrap_or(default.negative),
    )?)
}

/// Polarity thresholds, falling back to 0.7 / -0.7.
fn polarity_thresholds(
    positive: Option<f64>,
    negative: Option<f64>,
) -> Result<ThresholdConfig> {
    let default = ThresholdConfig::continuous();
    Ok(ThresholdConfig::polarity(
        positive.unwrap_or(default.positive),
        negative.unwrap_or(default.negative),
    )?)
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{name} is not set"))
}

fn threshold(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<f64>> {
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("{name} is not a number: {v}"))
        })
        .transpose()
}
