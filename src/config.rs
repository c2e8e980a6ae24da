//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.socialsift.toml` files.

use crate::analysis::Averaging;
use crate::cli::OutputFormat;
use crate::models::AnalyticKind;
use crate::packer::PackingLimits;
use crate::source::platform::PlatformKind;
use crate::source::SourceId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".socialsift.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Batch packing limits.
    #[serde(default)]
    pub packing: PackingConfig,

    /// Analytics endpoint settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Per-platform settings.
    #[serde(default)]
    pub platforms: PlatformsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Directory for raw search result dumps.
    #[serde(default)]
    pub dump_dir: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
            dump_dir: None,
        }
    }
}

fn default_output() -> String {
    "socialsift_report.md".to_string()
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Term matched against record text.
    #[serde(default)]
    pub term: String,

    /// Upper bound on results per platform.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Traverse the sources of one platform concurrently.
    #[serde(default = "default_true")]
    pub concurrent: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            term: String::new(),
            limit: default_limit(),
            concurrent: true,
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Batch packing limits of the analytics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingConfig {
    /// Maximum characters in one document.
    #[serde(default = "default_max_doc_chars")]
    pub max_doc_chars: usize,

    /// Maximum serialized size of one request.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Maximum documents in one request.
    #[serde(default = "default_max_batch_docs")]
    pub max_batch_docs: usize,

    /// Bytes reserved for request headers.
    #[serde(default)]
    pub reserved_header_bytes: usize,
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            max_doc_chars: default_max_doc_chars(),
            max_batch_bytes: default_max_batch_bytes(),
            max_batch_docs: default_max_batch_docs(),
            reserved_header_bytes: 0,
        }
    }
}

fn default_max_doc_chars() -> usize {
    5_000
}

fn default_max_batch_bytes() -> usize {
    1_000_000
}

fn default_max_batch_docs() -> usize {
    1_000
}

impl From<&PackingConfig> for PackingLimits {
    fn from(config: &PackingConfig) -> Self {
        Self {
            max_doc_chars: config.max_doc_chars,
            max_batch_bytes: config.max_batch_bytes,
            max_batch_docs: config.max_batch_docs,
            reserved_header_bytes: config.reserved_header_bytes,
        }
    }
}

/// Text analytics endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Submit packed batches for analysis.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL; the analytic kind is appended (`.../v2.0/sentiment`).
    #[serde(default)]
    pub endpoint: String,

    /// Subscription key sent as `Ocp-Apim-Subscription-Key`.
    #[serde(default)]
    pub key: Option<String>,

    /// Analyses to run for every batch.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<AnalyticKind>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// How running confidences and scores are averaged.
    #[serde(default)]
    pub averaging: Averaging,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            key: None,
            kinds: default_kinds(),
            timeout_seconds: default_timeout(),
            averaging: Averaging::default(),
        }
    }
}

fn default_kinds() -> Vec<AnalyticKind> {
    vec![
        AnalyticKind::Languages,
        AnalyticKind::Sentiment,
        AnalyticKind::KeyPhrases,
    ]
}

fn default_timeout() -> u64 {
    30
}

/// Settings for every supported platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    #[serde(default)]
    pub facebook: FacebookConfig,

    #[serde(default)]
    pub reddit: RedditConfig,

    #[serde(default)]
    pub tumblr: TumblrConfig,

    #[serde(default)]
    pub twitter: TwitterConfig,
}

impl PlatformsConfig {
    /// Platforms switched on in the config file.
    pub fn enabled(&self) -> Vec<PlatformKind> {
        let mut kinds = Vec::new();
        if self.facebook.enabled {
            kinds.push(PlatformKind::Facebook);
        }
        if self.reddit.enabled {
            kinds.push(PlatformKind::Reddit);
        }
        if self.tumblr.enabled {
            kinds.push(PlatformKind::Tumblr);
        }
        if self.twitter.enabled {
            kinds.push(PlatformKind::Twitter);
        }
        kinds
    }

    /// Sources to search on `kind`. Twitter has one implicit source, the
    /// search term.
    pub fn source_ids(&self, kind: PlatformKind, term: &str) -> Vec<SourceId> {
        let names = match kind {
            PlatformKind::Facebook => &self.facebook.sources,
            PlatformKind::Reddit => &self.reddit.sources,
            PlatformKind::Tumblr => &self.tumblr.sources,
            PlatformKind::Twitter => return vec![SourceId::from(term)],
        };
        names.iter().map(|name| SourceId::from(name.as_str())).collect()
    }
}

/// Facebook Graph API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Public page names.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Graph API token; falls back to `FACEBOOK_ACCESS_TOKEN`.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_facebook_url")]
    pub base_url: String,

    #[serde(default = "default_facebook_page_size")]
    pub page_size: u32,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FacebookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sources: Vec::new(),
            access_token: None,
            base_url: default_facebook_url(),
            page_size: default_facebook_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_facebook_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_facebook_page_size() -> u32 {
    100
}

/// Reddit listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Subreddit names, without the `r/` prefix.
    #[serde(default)]
    pub sources: Vec<String>,

    /// OAuth bearer token; falls back to `REDDIT_ACCESS_TOKEN`. Anonymous
    /// access is used when neither is set.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_reddit_url")]
    pub base_url: String,

    #[serde(default = "default_reddit_page_size")]
    pub page_size: u32,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sources: Vec::new(),
            access_token: None,
            base_url: default_reddit_url(),
            page_size: default_reddit_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_reddit_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_reddit_page_size() -> u32 {
    100
}

/// Tumblr API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TumblrConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Blog identifiers (`name.tumblr.com`).
    #[serde(default)]
    pub sources: Vec<String>,

    /// Consumer key; falls back to `TUMBLR_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_tumblr_url")]
    pub base_url: String,

    #[serde(default = "default_tumblr_page_size")]
    pub page_size: u32,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for TumblrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sources: Vec::new(),
            api_key: None,
            base_url: default_tumblr_url(),
            page_size: default_tumblr_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_tumblr_url() -> String {
    "https://api.tumblr.com/v2".to_string()
}

fn default_tumblr_page_size() -> u32 {
    50
}

/// Twitter search API settings. The search term is the only source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    #[serde(default)]
    pub enabled: bool,

    /// App-only bearer token; falls back to `TWITTER_BEARER_TOKEN`.
    #[serde(default)]
    pub bearer_token: Option<String>,

    #[serde(default = "default_twitter_url")]
    pub base_url: String,

    /// `popular`, `recent` or `mixed`.
    #[serde(default = "default_result_type")]
    pub result_type: String,

    #[serde(default = "default_twitter_page_size")]
    pub page_size: u32,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bearer_token: None,
            base_url: default_twitter_url(),
            result_type: default_result_type(),
            page_size: default_twitter_page_size(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_twitter_url() -> String {
    "https://api.twitter.com/1.1".to_string()
}

fn default_result_type() -> String {
    "popular".to_string()
}

fn default_twitter_page_size() -> u32 {
    100
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref term) = args.term {
            self.search.term = term.clone();
        }
        if let Some(limit) = args.limit {
            self.search.limit = limit;
        }
        if args.sequential {
            self.search.concurrent = false;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref dir) = args.dump_dir {
            self.general.dump_dir = Some(dir.display().to_string());
        }

        // Platforms - an explicit list switches the others off
        if let Some(ref platforms) = args.platforms {
            self.platforms.facebook.enabled = platforms.contains(&PlatformKind::Facebook);
            self.platforms.reddit.enabled = platforms.contains(&PlatformKind::Reddit);
            self.platforms.tumblr.enabled = platforms.contains(&PlatformKind::Tumblr);
            self.platforms.twitter.enabled = platforms.contains(&PlatformKind::Twitter);
        }

        if let Some(ref endpoint) = args.analytics_endpoint {
            self.analytics.endpoint = endpoint.clone();
        }
        if let Some(ref key) = args.analytics_key {
            self.analytics.key = Some(key.clone());
        }
        if args.no_analytics {
            self.analytics.enabled = false;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.packing.max_doc_chars, 5_000);
        assert_eq!(config.packing.max_batch_bytes, 1_000_000);
        assert_eq!(config.packing.max_batch_docs, 1_000);
        assert_eq!(config.analytics.averaging, Averaging::Pairwise);
        assert_eq!(config.analytics.kinds.len(), 3);
        assert!(config.platforms.enabled().is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.json"
format = "json"

[search]
term = "election"
limit = 30

[packing]
max_batch_docs = 500

[analytics]
endpoint = "https://westus.api.cognitive.microsoft.com/text/analytics/v2.0/"
kinds = ["sentiment", "keyPhrases"]
averaging = "arithmetic"

[platforms.reddit]
enabled = true
sources = ["news", "worldnews", "politics"]

[platforms.tumblr]
enabled = true
sources = ["cnnpolitics.tumblr.com"]
api_key = "abc"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.json");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.search.term, "election");
        assert_eq!(config.search.limit, 30);
        assert!(config.search.concurrent);
        assert_eq!(config.packing.max_batch_docs, 500);
        assert_eq!(config.packing.max_doc_chars, 5_000);
        assert_eq!(
            config.analytics.kinds,
            vec![AnalyticKind::Sentiment, AnalyticKind::KeyPhrases]
        );
        assert_eq!(config.analytics.averaging, Averaging::Arithmetic);
        assert_eq!(
            config.platforms.enabled(),
            vec![PlatformKind::Reddit, PlatformKind::Tumblr]
        );
        assert_eq!(config.platforms.source_ids(PlatformKind::Reddit, "election").len(), 3);
        assert_eq!(config.platforms.reddit.base_url, "https://www.reddit.com");
    }

    #[test]
    fn test_twitter_searches_the_term() {
        let toml_content = r#"
[platforms.twitter]
enabled = true
result_type = "recent"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.platforms.enabled(), vec![PlatformKind::Twitter]);
        assert_eq!(config.platforms.twitter.result_type, "recent");
        assert_eq!(config.platforms.twitter.base_url, "https://api.twitter.com/1.1");
        assert_eq!(
            config.platforms.source_ids(PlatformKind::Twitter, "storm"),
            vec![SourceId::from("storm")]
        );
        assert!(config.platforms.source_ids(PlatformKind::Tumblr, "storm").is_empty());
    }

    #[test]
    fn test_packing_limits_from_config() {
        let config = PackingConfig {
            max_doc_chars: 100,
            max_batch_bytes: 2_000,
            max_batch_docs: 7,
            reserved_header_bytes: 64,
        };
        let limits = PackingLimits::from(&config);
        assert_eq!(limits.max_doc_chars, 100);
        assert_eq!(limits.max_batch_bytes, 2_000);
        assert_eq!(limits.max_batch_docs, 7);
        assert_eq!(limits.reserved_header_bytes, 64);
    }

    #[test]
    fn test_merge_with_args_overrides() {
        let mut config = Config::default();
        config.search.term = "from-file".to_string();
        config.platforms.facebook.enabled = true;

        let args = crate::cli::Args {
            term: Some("storm".to_string()),
            limit: Some(40),
            sequential: true,
            platforms: Some(vec![PlatformKind::Reddit, PlatformKind::Twitter]),
            analytics_endpoint: Some("https://example.test/".to_string()),
            no_analytics: true,
            ..crate::cli::Args::default()
        };
        config.merge_with_args(&args);

        assert_eq!(config.search.term, "storm");
        assert_eq!(config.search.limit, 40);
        assert!(!config.search.concurrent);
        assert_eq!(
            config.platforms.enabled(),
            vec![PlatformKind::Reddit, PlatformKind::Twitter]
        );
        assert_eq!(config.analytics.endpoint, "https://example.test/");
        assert!(!config.analytics.enabled);
        assert_eq!(config.general.format, OutputFormat::Markdown);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[packing]"));
        assert!(toml_str.contains("[analytics]"));
    }
}
