//! Data models shared across the pipeline.
//!
//! Documents and batches produced by the packer, error records produced by
//! the search engine, analytic results, and the final run report.

use crate::analysis::AggregateReport;
use crate::source::SourceFetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Link from a document back to the caller's input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocOrigin {
    /// Index of the input text this document came from.
    pub input_index: usize,
    /// Position among the chunks of a split input; `None` when unsplit.
    pub chunk_index: Option<usize>,
}

/// The unit submitted to the analytics endpoint.
///
/// Only `id` and `text` go over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(skip)]
    pub origin: Option<DocOrigin>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            origin: None,
        }
    }
}

/// An ordered group of documents sent in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub documents: Vec<Document>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Size of the request body this batch serializes to.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
    }
}

/// A source traversal that failed and was abandoned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub origin: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(kind: impl Into<String>, origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            origin: origin.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&SourceFetchError> for ErrorRecord {
    fn from(err: &SourceFetchError) -> Self {
        Self::new(err.kind.to_string(), err.origin.clone(), err.message.clone())
    }
}

/// The analyses the endpoint offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyticKind {
    /// Language detection; categorical.
    Languages,
    /// Sentiment score; scalar.
    Sentiment,
    /// Key phrase extraction; frequencies.
    KeyPhrases,
}

impl AnalyticKind {
    /// Path segment appended to the endpoint URL.
    pub fn path(&self) -> &'static str {
        match self {
            AnalyticKind::Languages => "languages",
            AnalyticKind::Sentiment => "sentiment",
            AnalyticKind::KeyPhrases => "keyPhrases",
        }
    }
}

impl fmt::Display for AnalyticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// One detected category with the analyser's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    pub confidence: f64,
}

/// The reduced output of one batch for one analytic kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AnalyticResult {
    Categorical(Vec<Detection>),
    Scalar(f64),
    Frequencies(BTreeMap<String, u64>),
}

impl AnalyticResult {
    /// The analytic kind this result shape belongs to.
    pub fn kind(&self) -> AnalyticKind {
        match self {
            AnalyticResult::Categorical(_) => AnalyticKind::Languages,
            AnalyticResult::Scalar(_) => AnalyticKind::Sentiment,
            AnalyticResult::Frequencies(_) => AnalyticKind::KeyPhrases,
        }
    }
}

/// Everything collected and computed for one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReport {
    pub platform: String,
    pub sources: Vec<String>,
    pub status: crate::search::SearchStatus,
    pub records_collected: usize,
    pub documents_submitted: usize,
    pub batches_submitted: usize,
    pub errors: Vec<ErrorRecord>,
    /// `None` when analytics was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateReport>,
}

/// Metadata about the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub term: String,
    pub limit: usize,
    pub run_date: DateTime<Utc>,
    pub analytics_endpoint: Option<String>,
    pub duration_seconds: f64,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub platforms: Vec<PlatformReport>,
}

impl RunReport {
    pub fn total_records(&self) -> usize {
        self.platforms.iter().map(|p| p.records_collected).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.platforms.iter().map(|p| p.errors.len()).sum()
    }

    /// True when at least one platform was searched and every searched
    /// source of every platform failed.
    pub fn every_source_failed(&self) -> bool {
        !self.platforms.is_empty()
            && self
                .platforms
                .iter()
                .all(|p| p.status == crate::search::SearchStatus::AllFailed)
    }
}
