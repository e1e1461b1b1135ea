// src/report.rs
// =============================================================================
// The crawl report and how it gets written out.
//
// Shape of the JSON document:
// {
//   "data":  { "<url>": { "title", "text", "meta_description" }, ... },
//   "stats": { "total_pages_scraped", "total_urls_processed", "failed_urls",
//              "start_url", "start_time", "end_time", "duration",
//              "success_rate", "failures": [...] }
// }
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Content kept for one scraped page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageData {
    pub title: String,
    pub text: String,
    pub meta_description: String,
}

/// A URL that was given up on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedUrl {
    pub url: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Fetch attempts made, including the first one
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub total_pages_scraped: usize,
    pub total_urls_processed: usize,
    pub failed_urls: usize,
    pub start_url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Seconds
    pub duration: f64,
    pub success_rate: f64,
    pub failures: Vec<FailedUrl>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    // BTreeMap keeps the output stable between runs
    pub data: BTreeMap<String, PageData>,
    pub stats: RunStats,
}

// Writes the report as pretty JSON, to a file when a path is given or to
// stdout otherwise
pub fn write_report(report: &Report, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating output directory {}", parent.display()))?;
            }
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, report)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, report)?;
            handle.write_all(b"\n")?;
        }
    }
    Ok(())
}
