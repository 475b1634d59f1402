//! Net Promoter Score over provider sentiment results.
//!
//! Each result is classified as promoter, detractor or passive using the
//! provider's thresholds; the score is `%promoters - %detractors` over the
//! total number of documents in the window.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::sentiment::{SentimentLabel, SentimentResult};

/// Promoter/detractor thresholds for one provider.
///
/// For categorical results both values are confidence cut-offs in `[0, 1]`.
/// For continuous results they are polarity cut-offs: promoters lie strictly
/// above `positive`, detractors strictly below `negative`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub positive: f64,
    pub negative: f64,
}

impl ThresholdConfig {
    /// Strict categorical operating point (0.8 / 0.8). The default for categorical providers.
    #[must_use]
    pub const fn categorical_strict() -> Self {
        Self {
            positive: 0.8,
            negative: 0.8,
        }
    }

    /// Lenient categorical operating point (0.55 / 0.40).
    #[must_use]
    pub const fn categorical_lenient() -> Self {
        Self {
            positive: 0.55,
            negative: 0.40,
        }
    }

    /// Continuous polarity cut-offs (0.7 / -0.7).
    #[must_use]
    pub const fn continuous() -> Self {
        Self {
            positive: 0.7,
            negative: -0.7,
        }
    }

    /// Categorical thresholds, each of which must lie in `[0, 1]`.
    pub fn categorical(positive: f64, negative: f64) -> PipelineResult<Self> {
        for value in [positive, negative] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidThreshold {
                    value,
                    reason: "categorical thresholds must lie within [0, 1]".to_string(),
                });
            }
        }
        Ok(Self { positive, negative })
    }

    /// Continuous thresholds; `negative` must not exceed `positive`.
    pub fn polarity(positive: f64, negative: f64) -> PipelineResult<Self> {
        if !positive.is_finite() || !negative.is_finite() {
            return Err(PipelineError::InvalidThreshold {
                value: if positive.is_finite() { negative } else { positive },
                reason: "polarity thresholds must be finite".to_string(),
            });
        }
        if negative > positive {
            return Err(PipelineError::InvalidThreshold {
                value: negative,
                reason: format!("negative threshold exceeds positive threshold {positive}"),
            });
        }
        Ok(Self { positive, negative })
    }
}

/// How a single result counts towards the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Promoter,
    Detractor,
    Passive,
}

/// Classify one result against the thresholds.
#[must_use]
pub fn classify(result: &SentimentResult, thresholds: &ThresholdConfig) -> Classification {
    match *result {
        SentimentResult::Categorical {
            label: SentimentLabel::Positive,
            positive,
            ..
        } if positive > thresholds.positive => Classification::Promoter,
        SentimentResult::Categorical {
            label: SentimentLabel::Negative,
            negative,
            ..
        } if negative > thresholds.negative => Classification::Detractor,
        SentimentResult::Continuous { polarity, .. } if polarity > thresholds.positive => {
            Classification::Promoter
        }
        SentimentResult::Continuous { polarity, .. } if polarity < thresholds.negative => {
            Classification::Detractor
        }
        _ => Classification::Passive,
    }
}

/// Score for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpsResult {
    pub promoters_count: usize,
    pub detractors_count: usize,
    pub total_documents: usize,
    pub score: f64,
}

/// Compute the NPS of `results` over `total_documents`.
///
/// `results` may cover fewer documents than `total_documents`; unscored
/// documents only count towards the denominator.
pub fn score(
    results: &[SentimentResult],
    total_documents: usize,
    thresholds: &ThresholdConfig,
) -> PipelineResult<NpsResult> {
    if total_documents == 0 {
        return Err(PipelineError::DivisionByZero);
    }

    let (promoters_count, detractors_count) =
        results
            .iter()
            .fold((0, 0), |(p, d), r| match classify(r, thresholds) {
                Classification::Promoter => (p + 1, d),
                Classification::Detractor => (p, d + 1),
                Classification::Passive => (p, d),
            });

    let total = total_documents as f64;
    let score =
        (promoters_count as f64 / total * 100.0) - (detractors_count as f64 / total * 100.0);

    Ok(NpsResult {
        promoters_count,
        detractors_count,
        total_documents,
        score,
    })
}
