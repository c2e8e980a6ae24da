//! Facebook Graph API adapter.
//!
//! Pages through the posts of public pages by following the absolute
//! `paging.next` links the Graph API returns.

use super::{
    get_json, http_client, matches_fields, records_from, Page, PageToken, Record, SourceAdapter,
    SourceFetchError, SourceId,
};
use crate::config::FacebookConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const MATCH_FIELDS: &[&str] = &["message", "name"];
const POST_FIELDS: &str = "permalink_url,message,name,id";

/// Client for public Facebook pages.
pub struct FacebookClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    page_size: u32,
}

impl FacebookClient {
    pub fn new(config: &FacebookConfig, access_token: String) -> Result<Self> {
        let http = http_client(config.timeout_seconds).context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            page_size: config.page_size,
        })
    }

    async fn resolve_page_id(&self, source: &SourceId, origin: &str) -> Result<String, SourceFetchError> {
        let url = format!("{}/{}", self.base_url, source);
        let body = get_json(
            self.http
                .get(&url)
                .query(&[("fields", "id"), ("access_token", self.access_token.as_str())]),
            origin,
        )
        .await?;

        body.get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| SourceFetchError::decode(origin, "page lookup returned no id"))
    }
}

/// Parse a Graph API posts page (`{data: [...], paging: {next}}`).
pub fn parse_posts_page(body: &Value) -> Page {
    let next = body
        .pointer("/paging/next")
        .and_then(Value::as_str)
        .map(|url| PageToken(url.to_string()));
    Page::new(records_from(body.get("data")), next)
}

/// The post text followed by every comment message.
pub fn extract_texts(record: &Record) -> Vec<String> {
    let headline = record
        .get("message")
        .or_else(|| record.get("name"))
        .and_then(Value::as_str);

    let comments = record
        .get("secondary_information")
        .and_then(|info| info.pointer("/comments"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|comment| comment.get("message").and_then(Value::as_str));

    headline
        .into_iter()
        .chain(comments)
        .filter(|text| !text.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl SourceAdapter for FacebookClient {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError> {
        let origin = format!("facebook:{}", source);
        let page_id = self.resolve_page_id(source, &origin).await?;
        debug!("Resolved facebook page {} to id {}", source, page_id);

        let url = format!("{}/{}/posts", self.base_url, page_id);
        let limit = self.page_size.to_string();
        let body = get_json(
            self.http.get(&url).query(&[
                ("fields", POST_FIELDS),
                ("limit", limit.as_str()),
                ("access_token", self.access_token.as_str()),
            ]),
            &origin,
        )
        .await?;

        Ok(parse_posts_page(&body))
    }

    async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError> {
        let body = get_json(self.http.get(token.as_str()), "facebook").await?;
        Ok(parse_posts_page(&body))
    }

    fn matches(&self, term: &str, record: &Record) -> bool {
        matches_fields(term, record, MATCH_FIELDS)
    }

    async fn enrich(&self, mut record: Record) -> Result<Record, SourceFetchError> {
        let post_id = record
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| SourceFetchError::decode("facebook", "post has no id"))?;

        let origin = format!("facebook:{}", post_id);
        let url = format!("{}/{}/comments", self.base_url, post_id);
        let body = get_json(
            self.http
                .get(&url)
                .query(&[("access_token", self.access_token.as_str())]),
            &origin,
        )
        .await?;

        let comments = body.get("data").cloned().unwrap_or_else(|| json!([]));
        record.insert(
            "secondary_information".to_string(),
            json!({ "comments": comments }),
        );
        Ok(record)
    }
}
