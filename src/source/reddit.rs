//! Reddit listing adapter.
//!
//! Walks `/r/{subreddit}/new.json` using the listing `after` cursor.

use super::{
    get_json, http_client, matches_fields, Page, PageToken, Record, SourceAdapter,
    SourceFetchError, SourceId,
};
use crate::config::RedditConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

const MATCH_FIELDS: &[&str] = &["title"];

/// Client for public subreddits.
pub struct RedditClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    page_size: u32,
}

impl RedditClient {
    pub fn new(config: &RedditConfig, access_token: Option<String>) -> Result<Self> {
        let http = http_client(config.timeout_seconds).context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            page_size: config.page_size,
        })
    }

    fn listing_url(&self, subreddit: &str, after: Option<&str>) -> String {
        listing_url(&self.base_url, subreddit, self.page_size, after)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match self.access_token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch_listing(&self, subreddit: &str, url: &str, origin: &str) -> Result<Page, SourceFetchError> {
        let body = get_json(self.get(url), origin).await?;
        parse_listing(&body, origin).map(|(items, after)| {
            let next = after.map(|after| PageToken(self.listing_url(subreddit, Some(&after))));
            Page::new(items, next)
        })
    }
}

pub fn listing_url(base_url: &str, subreddit: &str, limit: u32, after: Option<&str>) -> String {
    let mut url = format!("{}/r/{}/new.json?limit={}&raw_json=1", base_url, subreddit, limit);
    if let Some(after) = after {
        url.push_str("&after=");
        url.push_str(after);
    }
    url
}

/// Recover the subreddit name from a listing URL built by [`listing_url`].
fn subreddit_of(url: &str) -> Option<&str> {
    let rest = url.split("/r/").nth(1)?;
    rest.split('/').next().filter(|s| !s.is_empty())
}

/// Parse a listing body into its post records and `after` cursor.
pub fn parse_listing(body: &Value, origin: &str) -> Result<(Vec<Record>, Option<String>), SourceFetchError> {
    let children = body
        .pointer("/data/children")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceFetchError::decode(origin, "listing has no data.children"))?;

    let items = children
        .iter()
        .filter_map(|child| child.get("data").and_then(Value::as_object).cloned())
        .collect();

    let after = body
        .pointer("/data/after")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    Ok((items, after))
}

/// Top-level comments (`kind == "t1"`) from a `/comments/{id}.json` body.
pub fn parse_comments(body: &Value) -> Vec<Value> {
    body.get(1)
        .and_then(|listing| listing.pointer("/data/children"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|child| child.get("kind").and_then(Value::as_str) == Some("t1"))
        .filter_map(|child| child.get("data"))
        .filter_map(|data| {
            let body = data.get("body").and_then(Value::as_str)?;
            Some(json!({
                "body": body,
                "user_screen_name": data.get("author").cloned().unwrap_or(Value::Null),
            }))
        })
        .collect()
}

/// The post title followed by every comment body.
pub fn extract_texts(record: &Record) -> Vec<String> {
    let title = record.get("title").and_then(Value::as_str);

    let comments = record
        .get("secondary_information")
        .and_then(|info| info.get("comments"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|comment| comment.get("body").and_then(Value::as_str));

    title
        .into_iter()
        .chain(comments)
        .filter(|text| !text.is_empty())
        .map(String::from)
        .collect()
}

#[async_trait]
impl SourceAdapter for RedditClient {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError> {
        let origin = format!("reddit:{}", source);
        let url = self.listing_url(source.as_str(), None);
        self.fetch_listing(source.as_str(), &url, &origin).await
    }

    async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError> {
        let subreddit = subreddit_of(token.as_str())
            .ok_or_else(|| SourceFetchError::decode("reddit", "page token is not a listing URL"))?;
        self.fetch_listing(subreddit, token.as_str(), "reddit").await
    }

    fn matches(&self, term: &str, record: &Record) -> bool {
        matches_fields(term, record, MATCH_FIELDS)
    }

    async fn enrich(&self, mut record: Record) -> Result<Record, SourceFetchError> {
        let post_id = record
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| SourceFetchError::decode("reddit", "post has no id"))?;

        let origin = format!("reddit:{}", post_id);
        let url = format!("{}/comments/{}.json?raw_json=1", self.base_url, post_id);
        let body = get_json(self.get(&url), &origin).await?;

        record.insert(
            "secondary_information".to_string(),
            json!({ "comments": parse_comments(&body) }),
        );
        Ok(record)
    }
}
