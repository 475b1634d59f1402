//! Sentiment result types shared by all providers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a configured sentiment provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Label assigned by a categorical provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    /// Predominantly positive.
    Positive,
    /// Predominantly negative.
    Negative,
    /// Neither positive nor negative.
    Neutral,
    /// Both positive and negative.
    Mixed,
}

impl SentimentLabel {
    /// Parse a label as emitted by the provider API.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "POSITIVE" => Some(Self::Positive),
            "NEGATIVE" => Some(Self::Negative),
            "NEUTRAL" => Some(Self::Neutral),
            "MIXED" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Positive => "POSITIVE",
            Self::Negative => "NEGATIVE",
            Self::Neutral => "NEUTRAL",
            Self::Mixed => "MIXED",
        };
        write!(f, "{s}")
    }
}

/// Family of results a provider produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Label plus per-label confidence.
    Categorical,
    /// Signed polarity plus magnitude.
    Continuous,
}

/// Per-document sentiment as returned by a provider.
///
/// The four categorical scores are independent; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SentimentResult {
    /// Label plus per-label confidence (AWS Comprehend style).
    Categorical {
        label: SentimentLabel,
        positive: f64,
        negative: f64,
        neutral: f64,
        mixed: f64,
    },
    /// Signed polarity plus magnitude (Google NLP style).
    Continuous { polarity: f64, magnitude: f64 },
}

impl SentimentResult {
    /// Categorical result with only the score matching `label` set.
    #[must_use]
    pub fn labelled(label: SentimentLabel, score: f64) -> Self {
        let (mut positive, mut negative, mut neutral, mut mixed) = (0.0, 0.0, 0.0, 0.0);
        match label {
            SentimentLabel::Positive => positive = score,
            SentimentLabel::Negative => negative = score,
            SentimentLabel::Neutral => neutral = score,
            SentimentLabel::Mixed => mixed = score,
        }
        Self::Categorical {
            label,
            positive,
            negative,
            neutral,
            mixed,
        }
    }

    /// Family this result belongs to.
    #[must_use]
    pub const fn kind(&self) -> ResultKind {
        match self {
            Self::Categorical { .. } => ResultKind::Categorical,
            Self::Continuous { .. } => ResultKind::Continuous,
        }
    }

    /// Continuous result.
    #[must_use]
    pub const fn polar(polarity: f64, magnitude: f64) -> Self {
        Self::Continuous {
            polarity,
            magnitude,
        }
    }
}
