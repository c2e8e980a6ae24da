//! Twitter standard search adapter.
//!
//! Twitter has no page-able feeds to walk, so the platform has a single
//! implicit source: the search query itself. Pages follow the
//! `search_metadata.next_results` cursor.

use super::{
    get_json, http_client, matches_fields, records_from, Page, PageToken, Record, SourceAdapter,
    SourceFetchError, SourceId,
};
use crate::config::TwitterConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

const MATCH_FIELDS: &[&str] = &["text"];

/// Client for the Twitter search API, authenticated with an app bearer token.
pub struct TwitterClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
    result_type: String,
    page_size: u32,
}

impl TwitterClient {
    pub fn new(config: &TwitterConfig, bearer_token: String) -> Result<Self> {
        let http = http_client(config.timeout_seconds).context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer_token,
            result_type: config.result_type.clone(),
            page_size: config.page_size,
        })
    }

    async fn fetch_at(&self, url: &str, origin: &str) -> Result<Page, SourceFetchError> {
        let request = self.http.get(url).bearer_auth(&self.bearer_token);
        let body = get_json(request, origin).await?;
        parse_search_page(&body, &self.base_url, origin)
    }
}

/// First-page URL for `query`.
pub fn search_url(base_url: &str, query: &str, result_type: &str, count: u32) -> Result<Url, String> {
    let count = count.to_string();
    Url::parse_with_params(
        &format!("{}/search/tweets.json", base_url),
        &[
            ("q", query),
            ("result_type", result_type),
            ("count", count.as_str()),
        ],
    )
    .map_err(|e| e.to_string())
}

/// Parse a search body into its statuses and the absolute URL of the next
/// page. `next_results` is a bare query string (`?max_id=...&q=...`).
pub fn parse_search_page(body: &Value, base_url: &str, origin: &str) -> Result<Page, SourceFetchError> {
    let statuses = body
        .get("statuses")
        .ok_or_else(|| SourceFetchError::decode(origin, "body has no statuses"))?;

    let items = records_from(Some(statuses));
    if items.is_empty() {
        return Ok(Page::exhausted());
    }

    let next = body
        .pointer("/search_metadata/next_results")
        .and_then(Value::as_str)
        .filter(|query| !query.is_empty())
        .map(|query| PageToken(format!("{}/search/tweets.json{}", base_url, query)));

    Ok(Page::new(items, next))
}

/// The tweet text.
pub fn extract_texts(record: &Record) -> Vec<String> {
    record
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(String::from)
        .into_iter()
        .collect()
}

#[async_trait]
impl SourceAdapter for TwitterClient {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError> {
        let origin = format!("twitter:{}", source);
        let url = search_url(&self.base_url, source.as_str(), &self.result_type, self.page_size)
            .map_err(|e| SourceFetchError::decode(&origin, e))?;
        self.fetch_at(url.as_str(), &origin).await
    }

    async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError> {
        self.fetch_at(token.as_str(), "twitter").await
    }

    fn matches(&self, term: &str, record: &Record) -> bool {
        matches_fields(term, record, MATCH_FIELDS)
    }

    /// Statuses are complete as returned by the search.
    async fn enrich(&self, record: Record) -> Result<Record, SourceFetchError> {
        Ok(record)
    }
}
