//! Raw record dumps.
//!
//! Each platform's collected records are written as one pretty-printed JSON
//! array to `{dir}/{platform}_{term}_{timestamp}.json`.

use crate::source::Record;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for one platform's dump. The term is reduced to characters that
/// are safe in file names.
pub fn dump_file_name(platform: &str, term: &str, at: DateTime<Utc>) -> String {
    let term: String = term
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_{}_{}.json", platform, term, at.format("%Y%m%d_%H%M%S"))
}

/// Write `records` under `dir`, creating it if needed. Returns the file path.
pub fn write_dump(dir: &Path, platform: &str, term: &str, records: &[Record], at: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create dump directory {}", dir.display()))?;

    let path = dir.join(dump_file_name(platform, term, at));
    let content = serde_json::to_string_pretty(records).context("Failed to serialize records")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write dump {}", path.display()))?;

    info!("Wrote {} {} record(s) to {}", records.len(), platform, path.display());
    Ok(path)
}
