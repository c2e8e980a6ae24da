//! Markdown report generation.
//!
//! This module renders a [`RunReport`] as Markdown or JSON.

use crate::analysis::AggregateReport;
use crate::models::{ErrorRecord, PlatformReport, RunMetadata, RunReport};
use crate::search::SearchStatus;
use anyhow::{Context, Result};
use std::path::Path;

const TOP_N: usize = 10;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# SocialSift Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata, report));
    output.push_str(&generate_table_of_contents(report));
    output.push_str(&generate_summary_section(report));

    for platform in &report.platforms {
        output.push_str(&generate_platform_section(platform));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata, report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Search Term:** `{}`\n", metadata.term));
    section.push_str(&format!("- **Limit per Platform:** {}\n", metadata.limit));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    match &metadata.analytics_endpoint {
        Some(endpoint) => section.push_str(&format!("- **Analytics Endpoint:** {}\n", endpoint)),
        None => section.push_str("- **Analytics:** skipped\n"),
    }
    section.push_str(&format!("- **Records Collected:** {}\n", report.total_records()));
    if report.total_errors() > 0 {
        section.push_str(&format!("- **Source Errors:** {}\n", report.total_errors()));
    }
    section.push_str(&format!("- **Run Duration:** {:.1}s\n", metadata.duration_seconds));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &RunReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    for platform in &report.platforms {
        toc.push_str(&format!("- [{}](#{})\n", title(&platform.platform), platform.platform));
    }
    toc.push('\n');

    toc
}

/// Generate the cross-platform summary table.
fn generate_summary_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    if report.platforms.is_empty() {
        section.push_str("No platforms were searched.\n\n");
        return section;
    }

    section.push_str("| Platform | Status | Records | Documents | Batches | Errors | Mean Sentiment |\n");
    section.push_str("|----------|--------|--------:|----------:|--------:|-------:|---------------:|\n");
    for platform in &report.platforms {
        let sentiment = platform
            .aggregate
            .as_ref()
            .and_then(|a| a.scalar.mean)
            .map(|mean| format!("{:.3}", mean))
            .unwrap_or_else(|| "-".to_string());
        section.push_str(&format!(
            "| {} | {} {} | {} | {} | {} | {} | {} |\n",
            title(&platform.platform),
            status_emoji(platform.status),
            platform.status,
            platform.records_collected,
            platform.documents_submitted,
            platform.batches_submitted,
            platform.errors.len(),
            sentiment
        ));
    }
    section.push('\n');

    if report.every_source_failed() {
        section.push_str("> Every searched source failed. No records could be collected.\n\n");
    }

    section
}

/// Generate the section for one platform.
fn generate_platform_section(platform: &PlatformReport) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title(&platform.platform)));
    section.push_str(&format!(
        "**Sources:** {}\n\n",
        if platform.sources.is_empty() {
            "none".to_string()
        } else {
            platform.sources.join(", ")
        }
    ));

    match platform.status {
        SearchStatus::NoMatches => section.push_str("No records matched the search term.\n\n"),
        SearchStatus::AllFailed => section.push_str("Every source failed; nothing was collected.\n\n"),
        _ => section.push_str(&format!("Collected {} matching record(s).\n\n", platform.records_collected)),
    }

    if let Some(aggregate) = &platform.aggregate {
        section.push_str(&generate_aggregate_block(aggregate));
    }

    if !platform.errors.is_empty() {
        section.push_str(&generate_errors_block(&platform.errors));
    }

    section
}

/// Generate the analytics tables of one platform.
fn generate_aggregate_block(aggregate: &AggregateReport) -> String {
    let mut block = String::new();

    if let Some(mean) = aggregate.scalar.mean {
        block.push_str("### Sentiment\n\n");
        block.push_str(&format!(
            "Mean score **{:.3}** over {} batch(es) ({} averaging).\n\n",
            mean,
            aggregate.scalar.raw_values.len(),
            match aggregate.averaging {
                crate::analysis::Averaging::Pairwise => "pairwise",
                crate::analysis::Averaging::Arithmetic => "arithmetic",
            }
        ));
    }

    if !aggregate.categorical.is_empty() {
        block.push_str("### Languages\n\n");
        block.push_str("| Language | Documents | Confidence |\n");
        block.push_str("|----------|----------:|-----------:|\n");
        for (name, stat) in aggregate.top_categories(TOP_N) {
            block.push_str(&format!("| {} | {} | {:.2} |\n", name, stat.count, stat.confidence));
        }
        block.push('\n');
    }

    if !aggregate.frequencies.is_empty() {
        block.push_str("### Key Phrases\n\n");
        block.push_str("| Phrase | Count |\n");
        block.push_str("|--------|------:|\n");
        for (phrase, count) in aggregate.top_phrases(TOP_N) {
            block.push_str(&format!("| {} | {} |\n", phrase.replace('|', "\\|"), count));
        }
        block.push('\n');
    }

    block
}

fn generate_errors_block(errors: &[ErrorRecord]) -> String {
    let mut block = String::new();

    block.push_str("### Errors\n\n");
    for err in errors {
        block.push_str(&format!(
            "- `{}` **{}** at {}: {}\n",
            err.origin,
            err.kind,
            err.timestamp.format("%H:%M:%S"),
            err.message
        ));
    }
    block.push('\n');

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by SocialSift*\n");

    footer
}

fn title(platform: &str) -> String {
    let mut chars = platform.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn status_emoji(status: SearchStatus) -> &'static str {
    match status {
        SearchStatus::Complete => "✅",
        SearchStatus::Partial => "⚠️",
        SearchStatus::AllFailed => "❌",
        SearchStatus::NoMatches => "➖",
    }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write `content` to `path`.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
