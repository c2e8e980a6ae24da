//! Closed set of supported platforms.
//!
//! [`Platform`] is the only place that knows which concrete clients exist.
//! It implements [`SourceAdapter`] by delegating to the wrapped client, so
//! the search engine works against the contract alone.

use super::facebook::{self, FacebookClient};
use super::reddit::{self, RedditClient};
use super::tumblr::{self, TumblrClient};
use super::twitter::{self, TwitterClient};
use super::{Page, PageToken, Record, SourceAdapter, SourceFetchError, SourceId};
use crate::config::PlatformsConfig;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Platform discriminant, used by the CLI and config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Facebook,
    Reddit,
    Tumblr,
    Twitter,
}

impl PlatformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Facebook => "facebook",
            PlatformKind::Reddit => "reddit",
            PlatformKind::Tumblr => "tumblr",
            PlatformKind::Twitter => "twitter",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured platform client.
pub enum Platform {
    Facebook(FacebookClient),
    Reddit(RedditClient),
    Tumblr(TumblrClient),
    Twitter(TwitterClient),
}

impl Platform {
    /// Build the client for `kind`, resolving credentials from the config
    /// first and the environment second.
    pub fn from_config(kind: PlatformKind, config: &PlatformsConfig) -> Result<Self> {
        debug!("Building {} client", kind);
        match kind {
            PlatformKind::Facebook => {
                let token = credential(&config.facebook.access_token, "FACEBOOK_ACCESS_TOKEN")
                    .ok_or_else(|| {
                        anyhow!("facebook needs access_token in config or FACEBOOK_ACCESS_TOKEN")
                    })?;
                Ok(Platform::Facebook(FacebookClient::new(&config.facebook, token)?))
            }
            PlatformKind::Reddit => {
                let token = credential(&config.reddit.access_token, "REDDIT_ACCESS_TOKEN");
                Ok(Platform::Reddit(RedditClient::new(&config.reddit, token)?))
            }
            PlatformKind::Tumblr => {
                let key = credential(&config.tumblr.api_key, "TUMBLR_API_KEY")
                    .ok_or_else(|| anyhow!("tumblr needs api_key in config or TUMBLR_API_KEY"))?;
                Ok(Platform::Tumblr(TumblrClient::new(&config.tumblr, key)?))
            }
            PlatformKind::Twitter => {
                let token = credential(&config.twitter.bearer_token, "TWITTER_BEARER_TOKEN")
                    .ok_or_else(|| {
                        anyhow!("twitter needs bearer_token in config or TWITTER_BEARER_TOKEN")
                    })?;
                Ok(Platform::Twitter(TwitterClient::new(&config.twitter, token)?))
            }
        }
    }

    pub fn kind(&self) -> PlatformKind {
        match self {
            Platform::Facebook(_) => PlatformKind::Facebook,
            Platform::Reddit(_) => PlatformKind::Reddit,
            Platform::Tumblr(_) => PlatformKind::Tumblr,
            Platform::Twitter(_) => PlatformKind::Twitter,
        }
    }

    /// Texts worth submitting for analysis from one collected record.
    pub fn extract_texts(&self, record: &Record) -> Vec<String> {
        extract_texts(self.kind(), record)
    }
}

/// Per-platform text extraction, usable without a live client.
pub fn extract_texts(kind: PlatformKind, record: &Record) -> Vec<String> {
    match kind {
        PlatformKind::Facebook => facebook::extract_texts(record),
        PlatformKind::Reddit => reddit::extract_texts(record),
        PlatformKind::Tumblr => tumblr::extract_texts(record),
        PlatformKind::Twitter => twitter::extract_texts(record),
    }
}

fn credential(configured: &Option<String>, env_var: &str) -> Option<String> {
    configured
        .clone()
        .or_else(|| std::env::var(env_var).ok())
        .filter(|value| !value.trim().is_empty())
}

#[async_trait]
impl SourceAdapter for Platform {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    async fn fetch_first_page(&self, source: &SourceId) -> Result<Page, SourceFetchError> {
        match self {
            Platform::Facebook(client) => client.fetch_first_page(source).await,
            Platform::Reddit(client) => client.fetch_first_page(source).await,
            Platform::Tumblr(client) => client.fetch_first_page(source).await,
            Platform::Twitter(client) => client.fetch_first_page(source).await,
        }
    }

    async fn fetch_next_page(&self, token: &PageToken) -> Result<Page, SourceFetchError> {
        match self {
            Platform::Facebook(client) => client.fetch_next_page(token).await,
            Platform::Reddit(client) => client.fetch_next_page(token).await,
            Platform::Tumblr(client) => client.fetch_next_page(token).await,
            Platform::Twitter(client) => client.fetch_next_page(token).await,
        }
    }

    fn matches(&self, term: &str, record: &Record) -> bool {
        match self {
            Platform::Facebook(client) => client.matches(term, record),
            Platform::Reddit(client) => client.matches(term, record),
            Platform::Tumblr(client) => client.matches(term, record),
            Platform::Twitter(client) => client.matches(term, record),
        }
    }

    async fn enrich(&self, record: Record) -> Result<Record, SourceFetchError> {
        match self {
            Platform::Facebook(client) => client.enrich(record).await,
            Platform::Reddit(client) => client.enrich(record).await,
            Platform::Tumblr(client) => client.enrich(record).await,
            Platform::Twitter(client) => client.enrich(record).await,
        }
    }
}
