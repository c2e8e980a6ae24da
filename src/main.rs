//! SocialSift - search paginated social feeds and analyse what they say
//!
//! A CLI tool that walks Facebook pages, subreddits, Tumblr blogs and the
//! Twitter search for posts mentioning a term, packs the matching texts into size-limited
//! batches for a text analytics endpoint, and folds the results into a
//! per-platform report.
//!
//! Exit codes:
//!   0 - Success (including runs where nothing matched)
//!   1 - Runtime error (config, analytics, packing, report writing, etc.)
//!   2 - Every searched source of every platform failed

mod analysis;
mod analytics;
mod cli;
mod config;
mod models;
mod packer;
mod report;
mod search;
mod source;

use analytics::AnalyticsClient;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::{PlatformReport, RunMetadata, RunReport};
use packer::PackingLimits;
use search::SearchOutcome;
use source::Platform;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging starts so its `verbose` flag applies
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("SocialSift v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(&args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .socialsift.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", config::CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    println!("   Enable platforms, list their sources, and set the analytics endpoint.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run search, analytics and reporting. Returns the exit code (0 or 2).
async fn run(args: &Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let term = config.search.term.trim().to_string();
    if term.is_empty() {
        bail!("No search term given; pass --term or set [search] term in {}", config::CONFIG_FILE);
    }

    // Step 1: Build the platform clients
    let kinds = config.platforms.enabled();
    if kinds.is_empty() {
        warn!("No platforms are enabled; the report will be empty");
    }

    let mut jobs = Vec::with_capacity(kinds.len());
    for kind in &kinds {
        let platform = Platform::from_config(*kind, &config.platforms)
            .with_context(|| format!("Failed to configure {}", kind))?;
        let sources = config.platforms.source_ids(*kind, &term);
        if sources.is_empty() {
            warn!("{} is enabled but lists no sources", kind);
        }
        jobs.push((Arc::new(platform), sources));
    }
    let platforms: Vec<Arc<Platform>> = jobs.iter().map(|(p, _)| Arc::clone(p)).collect();
    let source_names: Vec<Vec<String>> = jobs
        .iter()
        .map(|(_, sources)| sources.iter().map(|s| s.to_string()).collect())
        .collect();

    // Step 2: Search every platform
    println!("🔎 Searching {} platform(s) for \"{}\" (limit {})", kinds.len(), term, config.search.limit);
    let outcomes = search::search_platforms(jobs, &term, config.search.limit, config.search.concurrent).await;

    // Step 3: Analyse
    let analytics_client = if config.analytics.enabled {
        Some(AnalyticsClient::new(&config.analytics).context("Failed to configure analytics")?)
    } else {
        info!("Analytics disabled; collecting records only");
        None
    };

    let progress_bar = match &analytics_client {
        Some(_) if !args.quiet => {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} requests ({eta})")
                    .context("Invalid progress bar template")?
                    .progress_chars("#>-"),
            );
            Some(pb)
        }
        _ => None,
    };

    let limits = PackingLimits::from(&config.packing);
    let mut reports = Vec::with_capacity(outcomes.len());

    for ((platform, sources), (name, outcome)) in platforms.iter().zip(source_names).zip(outcomes) {
        debug!("Building report for {}", name);
        let report = build_platform_report(
            platform,
            sources,
            outcome,
            &term,
            &config,
            &limits,
            analytics_client.as_ref(),
            progress_bar.as_ref(),
        )
        .await?;
        reports.push(report);
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Analysis complete");
    }

    // Step 4: Build and save the report
    let report = RunReport {
        metadata: RunMetadata {
            term: term.clone(),
            limit: config.search.limit,
            run_date: Utc::now(),
            analytics_endpoint: analytics_client.as_ref().map(|c| c.endpoint().to_string()),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        platforms: reports,
    };

    let output = match config.general.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };
    let output_path = Path::new(&config.general.output);
    report::write_report(&output, output_path)?;

    // Print summary
    println!("\n📊 Run Summary:");
    for platform in &report.platforms {
        println!(
            "   {}: {} record(s), {} error(s) [{}]",
            platform.platform,
            platform.records_collected,
            platform.errors.len(),
            platform.status
        );
    }
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("\n✅ Report saved to: {}", output_path.display());

    if report.every_source_failed() {
        eprintln!("\n⛔ Every searched source failed. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Dump, analyse and summarise one platform's search outcome.
#[allow(clippy::too_many_arguments)]
async fn build_platform_report(
    platform: &Platform,
    sources: Vec<String>,
    outcome: SearchOutcome,
    term: &str,
    config: &Config,
    limits: &PackingLimits,
    analytics: Option<&AnalyticsClient>,
    progress: Option<&ProgressBar>,
) -> Result<PlatformReport> {
    let kind = platform.kind();
    let status = outcome.status();
    info!(
        "{}: {} record(s) from {} source(s), {}",
        kind,
        outcome.results.len(),
        outcome.sources_searched,
        status
    );
    for err in &outcome.errors {
        warn!("{}: {} failed ({}): {}", kind, err.origin, err.kind, err.message);
    }

    if let Some(ref dir) = config.general.dump_dir {
        report::write_dump(Path::new(dir), kind.as_str(), term, &outcome.results, Utc::now())?;
    }

    let texts: Vec<String> = outcome
        .results
        .iter()
        .flat_map(|record| platform.extract_texts(record))
        .filter(|text| !text.trim().is_empty())
        .collect();
    debug!("{}: {} text(s) extracted", kind, texts.len());

    let (aggregate, documents, batches) = match analytics {
        Some(client) => {
            let analysis = analytics::analyze_texts(
                client,
                &texts,
                limits,
                &config.analytics.kinds,
                config.analytics.averaging,
                progress,
            )
            .await
            .with_context(|| format!("Analytics failed for {}", kind))?;
            (Some(analysis.report), analysis.documents, analysis.batches)
        }
        None => (None, 0, 0),
    };

    Ok(PlatformReport {
        platform: kind.to_string(),
        sources,
        status,
        records_collected: outcome.results.len(),
        documents_submitted: documents,
        batches_submitted: batches,
        errors: outcome.errors,
        aggregate,
    })
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so nothing is logged here.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    Ok(Config::load_default()?.unwrap_or_default())
}
