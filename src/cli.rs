//! Command-line interface argument parsing.
//!
//! Every flag is optional so that `.socialsift.toml` can supply it; values
//! given here override the config file.

use crate::source::platform::PlatformKind;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SocialSift - search social feeds for a term and analyse what people say
///
/// Walks the configured Facebook pages, subreddits and Tumblr blogs, keeps the
/// posts that mention the term, and folds language, sentiment and key phrase
/// analytics over them into one report.
///
/// Examples:
///   socialsift --term election --limit 40 --platforms reddit
///   socialsift --term brexit --format json --output brexit.json
///   socialsift --term storm --no-analytics --dump-dir ./raw
///   socialsift --init-config
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Term to search for (case-insensitive substring match)
    #[arg(short, long, value_name = "TERM")]
    pub term: Option<String>,

    /// Maximum number of records per platform
    ///
    /// Split evenly across the platform's sources; a share left unused by
    /// one source is not given to the others.
    #[arg(short, long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .socialsift.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Platforms to search (comma-separated)
    ///
    /// Example: --platforms reddit,tumblr
    #[arg(long, value_name = "PLATFORMS", value_delimiter = ',')]
    pub platforms: Option<Vec<PlatformKind>>,

    /// Write the raw collected records of each platform to this directory
    #[arg(long, value_name = "DIR")]
    pub dump_dir: Option<PathBuf>,

    /// Collect records only; skip the analytics endpoint
    #[arg(long)]
    pub no_analytics: bool,

    /// Search sources one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,

    /// Analytics endpoint base URL
    #[arg(long, value_name = "URL", env = "SOCIALSIFT_ANALYTICS_ENDPOINT")]
    pub analytics_endpoint: Option<String>,

    /// Analytics subscription key
    #[arg(long, value_name = "KEY", env = "SOCIALSIFT_ANALYTICS_KEY", hide_env_values = true)]
    pub analytics_key: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .socialsift.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref term) = self.term {
            if term.trim().is_empty() {
                return Err("Search term must not be blank".to_string());
            }
        }

        if let Some(ref endpoint) = self.analytics_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Analytics endpoint must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref platforms) = self.platforms {
            if platforms.is_empty() {
                return Err("--platforms needs at least one platform".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            term: Some("election".to_string()),
            limit: Some(20),
            ..Args::default()
        }
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "socialsift",
            "--term",
            "storm",
            "--limit",
            "40",
            "--platforms",
            "reddit,tumblr",
            "--format",
            "json",
            "--sequential",
        ])
        .unwrap();

        assert_eq!(args.term.as_deref(), Some("storm"));
        assert_eq!(args.limit, Some(40));
        assert_eq!(
            args.platforms,
            Some(vec![PlatformKind::Reddit, PlatformKind::Tumblr])
        );
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert!(args.sequential);
        assert!(!args.no_analytics);
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let result = Args::try_parse_from(["socialsift", "--platforms", "myspace"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_blank_term() {
        let mut args = make_args();
        args.term = Some("   ".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_endpoint_scheme() {
        let mut args = make_args();
        args.analytics_endpoint = Some("westus.api.example.com".to_string());
        assert!(args.validate().is_err());

        args.analytics_endpoint = Some("https://westus.api.example.com/".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
