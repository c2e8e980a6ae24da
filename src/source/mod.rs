//! Source adapter contract.
//!
//! Every platform client implements [`SourceAdapter`]. The search engine
//! only ever talks to this trait, never to a concrete platform type.

pub mod facebook;
pub mod platform;
pub mod reddit;
pub mod tumblr;
pub mod twitter;

pub use platform::Platform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A raw item returned by a source: an unstructured mapping of named fields.
pub type Record = Map<String, Value>;

/// Opaque identifier of a page-able source (a page, subreddit, blog, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Opaque continuation cursor handed back to the adapter that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageToken(pub String);

impl PageToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of records plus the cursor to the next page.
///
/// `next == None` means the source is exhausted.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Record>,
    pub next: Option<PageToken>,
}

impl Page {
    pub fn new(items: Vec<Record>, next: Option<PageToken>) -> Self {
        Self { items, next }
    }

    /// A page with no items and no continuation.
    pub fn exhausted() -> Self {
        Self::default()
    }
}

/// Broad classification of an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorKind {
    /// Connection, DNS or other transport failure.
    Transport,
    /// The call exceeded the adapter's timeout.
    Timeout,
    /// Credentials were rejected (401/403).
    Auth,
    /// Any other non-success HTTP status.
    Status,
    /// The response body did not have the expected shape.
    Decode,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Transport => write!(f, "transport"),
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::Auth => write!(f, "auth"),
            FetchErrorKind::Status => write!(f, "status"),
            FetchErrorKind::Decode => write!(f, "decode"),
        }
    }
}

/// Failure of any adapter call.
#[derive(Debug, Clone, Error)]
#[error("{kind} error from {origin}: {message}")]
pub struct SourceFetchError {
    pub kind: FetchErrorKind,
    pub origin: String,
    pub message: String,
}

impl SourceFetchError {
    pub fn new(kind: FetchErrorKind, origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(origin: impl Into<String>, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchErrorKind::Timeout
        } else if err.is_decode() {
            FetchErrorKind::Decode
        } else if let Some(status) = err.status() {
            status_kind(status)
        } else {
            FetchErrorKind::Transport
        };
        Self::new(kind, origin, err.to_string())
    }

    pub fn decode(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Decode, origin, message)
    }
}

fn status_kind(status: reqwest::StatusCode) -> FetchErrorKind {
    match status.as_u16() {
        401 | 403 => FetchErrorKind::Auth,
        _ => FetchErrorKind::Status,
    }
}

/// Capability set every platform client must provide.
///
/// `fetch_first_page` is called once per distinct source; `fetch_next_page`
/// is called with the token from the previous page until it returns
/// `next == None`. Adapters bound their own call durations and report a
/// timeout as a [`SourceFetchError`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short platform name used in logs and error origins.
    fn name(&self) -> &str;

    async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError>;

    async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError>;

    /// Case-insensitive substring test against the record's text fields.
    fn matches(&self, term: &str, record: &Record) -> bool;

    /// Attach secondary data (comments, replies) to a matched record.
    async fn enrich(&self, record: Record) -> Result<Record, SourceFetchError>;
}

/// Case-insensitive substring match of `term` against any of `fields`.
///
/// Fields that are absent or not strings are ignored.
pub fn matches_fields(term: &str, record: &Record, fields: &[&str]) -> bool {
    let needle = term.to_lowercase();
    fields
        .iter()
        .filter_map(|field| record.get(*field).and_then(Value::as_str))
        .any(|text| text.to_lowercase().contains(&needle))
}

/// Build the HTTP client every bundled adapter uses.
pub(crate) fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("socialsift/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Send `request` and decode the body as JSON, mapping every failure to a
/// [`SourceFetchError`] tagged with `origin`.
pub(crate) async fn get_json(
    request: reqwest::RequestBuilder,
    origin: &str,
) -> Result<Value, SourceFetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceFetchError::from_reqwest(origin, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SourceFetchError::new(
            status_kind(status),
            origin,
            format!("HTTP {}: {}", status, body),
        ));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| SourceFetchError::decode(origin, e.to_string()))
}

/// Collect the JSON objects of an array value into records, skipping anything
/// that is not an object.
pub(crate) fn records_from(value: Option<&Value>) -> Vec<Record> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect()
        })
        .unwrap_or_default()
}
