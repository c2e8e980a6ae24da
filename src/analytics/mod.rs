//! Text analytics over collected records.
//!
//! Texts are packed into batches, each batch is submitted once per analytic
//! kind, and the per-batch results are folded into an [`AggregateReport`].

pub mod client;

pub use client::AnalyticsClient;

use crate::analysis::{fold, AggregateReport, AggregationError, Averaging};
use crate::models::{AnalyticKind, AnalyticResult, Batch, Detection};
use crate::packer::{pack_documents, PackingLimits};
use anyhow::Result;
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Something that can analyse one batch for one kind.
#[async_trait]
pub trait BatchAnalyzer: Send + Sync {
    async fn analyze(&self, kind: AnalyticKind, batch: &Batch) -> Result<AnalyticResult>;
}

/// Result of analysing one platform's texts.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub report: AggregateReport,
    pub documents: usize,
    pub batches: usize,
}

/// Pack `texts`, analyse every batch for every kind, and fold the results in
/// batch order.
///
/// Packing and shape errors abort the whole analysis.
pub async fn analyze_texts<A: BatchAnalyzer + ?Sized>(
    analyzer: &A,
    texts: &[String],
    limits: &PackingLimits,
    kinds: &[AnalyticKind],
    averaging: Averaging,
    progress: Option<&ProgressBar>,
) -> Result<AnalysisOutcome> {
    let batches = pack_documents(texts, limits)?;
    let documents = batches.iter().map(Batch::len).sum();
    info!(
        "Submitting {} document(s) in {} batch(es) for {} analytic kind(s)",
        documents,
        batches.len(),
        kinds.len()
    );

    if let Some(pb) = progress {
        pb.inc_length((batches.len() * kinds.len()) as u64);
    }

    let mut report = AggregateReport::new(averaging);
    for (index, batch) in batches.iter().enumerate() {
        for &kind in kinds {
            debug!("Analysing batch {} for {}", index, kind);
            let result = analyzer.analyze(kind, batch).await?;
            fold(&mut report, kind, result)?;
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
    }

    Ok(AnalysisOutcome {
        report,
        documents,
        batches: batches.len(),
    })
}

/// Reduce one endpoint response to the result shape of `kind`.
///
/// * languages: every `detectedLanguages[]` entry of every document
/// * sentiment: the mean of the documents' `score`
/// * keyPhrases: how often each phrase occurs across documents
pub fn result_from_response(kind: AnalyticKind, body: &Value) -> Result<AnalyticResult, AggregationError> {
    let expected = kind.to_string();
    let documents = body
        .get("documents")
        .and_then(Value::as_array)
        .ok_or_else(|| AggregationError::mismatch(&expected, "response without documents"))?;

    match kind {
        AnalyticKind::Languages => {
            let mut detections = Vec::new();
            for doc in documents {
                let detected = doc
                    .get("detectedLanguages")
                    .and_then(Value::as_array)
                    .ok_or_else(|| AggregationError::mismatch(&expected, "document without detectedLanguages"))?;
                for language in detected {
                    let name = language.get("name").and_then(Value::as_str);
                    let score = language.get("score").and_then(Value::as_f64);
                    match (name, score) {
                        (Some(name), Some(score)) => detections.push(Detection {
                            name: name.to_string(),
                            confidence: score,
                        }),
                        _ => return Err(AggregationError::mismatch(&expected, "malformed detectedLanguages entry")),
                    }
                }
            }
            Ok(AnalyticResult::Categorical(detections))
        }
        AnalyticKind::Sentiment => {
            let scores = documents
                .iter()
                .map(|doc| doc.get("score").and_then(Value::as_f64))
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| AggregationError::mismatch(&expected, "document without score"))?;
            if scores.is_empty() {
                return Err(AggregationError::mismatch(&expected, "no scored documents"));
            }
            Ok(AnalyticResult::Scalar(scores.iter().sum::<f64>() / scores.len() as f64))
        }
        AnalyticKind::KeyPhrases => {
            let mut frequencies = BTreeMap::new();
            for doc in documents {
                let phrases = doc
                    .get("keyPhrases")
                    .and_then(Value::as_array)
                    .ok_or_else(|| AggregationError::mismatch(&expected, "document without keyPhrases"))?;
                for phrase in phrases.iter().filter_map(Value::as_str) {
                    *frequencies.entry(phrase.to_string()).or_insert(0u64) += 1;
                }
            }
            Ok(AnalyticResult::Frequencies(frequencies))
        }
    }
}
