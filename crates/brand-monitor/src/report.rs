//! CSV export of accumulated mention sentiments.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::Writer;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::{AccumulatedState, ProviderResults};
use crate::sentiment::{ProviderId, ResultKind, SentimentResult};

/// Default directory for reports, relative to the working directory.
pub const DEFAULT_REPORT_DIR: &str = "reports";

const fn columns(kind: ResultKind) -> &'static [&'static str] {
    match kind {
        ResultKind::Categorical => &["label", "positive", "negative", "neutral", "mixed"],
        ResultKind::Continuous => &["polarity", "magnitude"],
    }
}

fn cells(kind: ResultKind, result: Option<&SentimentResult>) -> Vec<String> {
    match result {
        Some(SentimentResult::Categorical {
            label,
            positive,
            negative,
            neutral,
            mixed,
        }) if kind == ResultKind::Categorical => vec![
            label.to_string(),
            positive.to_string(),
            negative.to_string(),
            neutral.to_string(),
            mixed.to_string(),
        ],
        Some(SentimentResult::Continuous {
            polarity,
            magnitude,
        }) if kind == ResultKind::Continuous => vec![polarity.to_string(), magnitude.to_string()],
        _ => vec![String::new(); columns(kind).len()],
    }
}

/// File name used for a report written at `at`.
pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("mention_sentiments_report_{}.csv", at.timestamp())
}

/// Write `state` as CSV into `dir`, creating the directory if needed.
///
/// Returns the path of the written file.
pub fn write_report(dir: &Path, state: &AccumulatedState, at: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let path = dir.join(report_file_name(at));
    let file = File::create(&path)
        .with_context(|| format!("Failed to create report file {}", path.display()))?;
    write_csv(file, state)?;

    tracing::info!(
        path = %path.display(),
        rows = state.total_document_count(),
        "Wrote sentiment report"
    );
    Ok(path)
}

/// Write one row per accumulated document: the text, then each provider's columns.
pub fn write_csv<W: Write>(out: W, state: &AccumulatedState) -> Result<()> {
    let providers: Vec<(&ProviderId, &ProviderResults)> = state.per_provider().iter().collect();

    let mut writer = Writer::from_writer(out);

    let mut header = vec!["text".to_string()];
    for (id, results) in &providers {
        header.extend(columns(results.kind()).iter().map(|c| format!("{id}_{c}")));
    }
    writer
        .write_record(&header)
        .context("Failed to write report header")?;

    for (document, text) in state.documents().iter().enumerate() {
        let mut row = vec![text.clone()];
        for (_, results) in &providers {
            row.extend(cells(results.kind(), results.for_document(document)));
        }
        writer
            .write_record(&row)
            .with_context(|| format!("Failed to write report row {document}"))?;
    }

    writer.flush().context("Failed to flush report")?;
    Ok(())
}
