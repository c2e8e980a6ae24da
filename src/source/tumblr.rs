//! Tumblr blog posts adapter.
//!
//! Pages by `offset`. The source is exhausted on an empty page or once the
//! offset reaches the blog's `total_posts`.

use super::{
    get_json, http_client, matches_fields, records_from, Page, PageToken, Record, SourceAdapter,
    SourceFetchError, SourceId,
};
use crate::config::TumblrConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

const MATCH_FIELDS: &[&str] = &["summary"];

/// Client for public Tumblr blogs.
pub struct TumblrClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
}

impl TumblrClient {
    pub fn new(config: &TumblrConfig, api_key: String) -> Result<Self> {
        let http = http_client(config.timeout_seconds).context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            page_size: config.page_size,
        })
    }

    async fn fetch_at(&self, url: Url, origin: &str) -> Result<Page, SourceFetchError> {
        let body = get_json(self.http.get(url.clone()), origin).await?;
        parse_posts_page(&body, &url, origin)
    }
}

/// First-page URL for `blog`.
pub fn posts_url(base_url: &str, blog: &str, api_key: &str, limit: u32) -> Result<Url, String> {
    let limit = limit.to_string();
    Url::parse_with_params(
        &format!("{}/blog/{}/posts", base_url, blog),
        &[
            ("api_key", api_key),
            ("limit", limit.as_str()),
            ("offset", "0"),
            ("notes_info", "true"),
        ],
    )
    .map_err(|e| e.to_string())
}

fn offset_of(url: &Url) -> u64 {
    url.query_pairs()
        .find(|(key, _)| key == "offset")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

fn with_offset(url: &Url, offset: u64) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "offset")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut next = url.clone();
    {
        let mut query = next.query_pairs_mut();
        query.clear();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        query.append_pair("offset", &offset.to_string());
    }
    next
}

/// Parse a `/posts` body fetched from `url` and compute the next offset token.
pub fn parse_posts_page(body: &Value, url: &Url, origin: &str) -> Result<Page, SourceFetchError> {
    let response = body
        .get("response")
        .ok_or_else(|| SourceFetchError::decode(origin, "body has no response object"))?;

    let items = records_from(response.get("posts"));
    if items.is_empty() {
        return Ok(Page::exhausted());
    }

    let next_offset = offset_of(url) + items.len() as u64;
    let total = response
        .get("total_posts")
        .or_else(|| response.pointer("/blog/total_posts"))
        .and_then(Value::as_u64);

    let next = match total {
        Some(total) if next_offset >= total => None,
        _ => Some(PageToken(with_offset(url, next_offset).to_string())),
    };

    Ok(Page::new(items, next))
}

/// The post summary followed by the text added in each reblog note.
pub fn extract_texts(record: &Record) -> Vec<String> {
    let summary = record.get("summary").and_then(Value::as_str);

    let reblogs = record
        .get("notes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|note| note.get("type").and_then(Value::as_str) == Some("reblog"))
        .filter_map(|note| note.get("added_text").and_then(Value::as_str));

    summary
        .into_iter()
        .chain(reblogs)
        .filter(|text| !text.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl SourceAdapter for TumblrClient {
    fn name(&self) -> &str {
        "tumblr"
    }

    async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError> {
        let origin = format!("tumblr:{}", source);
        let url = posts_url(&self.base_url, source.as_str(), &self.api_key, self.page_size)
            .map_err(|e| SourceFetchError::decode(&origin, e))?;
        self.fetch_at(url, &origin).await
    }

    async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError> {
        let url = Url::parse(token.as_str())
            .map_err(|e| SourceFetchError::decode("tumblr", e.to_string()))?;
        self.fetch_at(url, "tumblr").await
    }

    fn matches(&self, term: &str, record: &Record) -> bool {
        matches_fields(term, record, MATCH_FIELDS)
    }

    /// Posts are fetched with `notes_info=true`, so there is nothing to add.
    async fn enrich(&self, record: Record) -> Result<Record, SourceFetchError> {
        Ok(record)
    }
}
