// src/crawl/aggregate.rs
// =============================================================================
// Collects page results and run statistics from all workers.
//
// Counters are atomics (increments commute, so the final numbers don't depend
// on how workers interleave); the page map and failure list sit behind
// mutexes. finalize() is only meaningful once every worker has finished.
// =============================================================================

use crate::fetch::ContentKind;
use crate::report::{FailedUrl, PageData, Report, RunStats};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// One scraped page, as produced by a worker
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub url: String,
    pub title: String,
    pub text: String,
    pub meta_description: String,
    pub content_type: ContentKind,
}

pub struct Aggregator {
    start_url: String,
    start_time: DateTime<Utc>,
    started: Instant,
    pages_scraped: AtomicUsize,
    urls_processed: AtomicUsize,
    failed_urls: AtomicUsize,
    pages: Mutex<BTreeMap<String, PageData>>,
    failures: Mutex<Vec<FailedUrl>>,
}

impl Aggregator {
    pub fn new(start_url: &str) -> Self {
        Self {
            start_url: start_url.to_string(),
            start_time: Utc::now(),
            started: Instant::now(),
            pages_scraped: AtomicUsize::new(0),
            urls_processed: AtomicUsize::new(0),
            failed_urls: AtomicUsize::new(0),
            pages: Mutex::new(BTreeMap::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    // Stores a page under its URL. A second report for the same URL replaces
    // the first.
    pub fn record_page(&self, result: PageResult) {
        let PageResult {
            url,
            title,
            text,
            meta_description,
            content_type,
        } = result;

        tracing::debug!(url = %url, content_type = content_type.as_str(), chars = text.len(), "page recorded");
        self.pages.lock().insert(
            url,
            PageData {
                title,
                text,
                meta_description,
            },
        );
    }

    /// Counts a scraped page; returns the new total of scraped pages.
    pub fn record_success(&self) -> usize {
        self.urls_processed.fetch_add(1, Ordering::SeqCst);
        self.pages_scraped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_failure(&self, failure: FailedUrl) {
        self.urls_processed.fetch_add(1, Ordering::SeqCst);
        self.failed_urls.fetch_add(1, Ordering::SeqCst);
        self.failures.lock().push(failure);
    }

    /// Whether `url` ended up in the failure list
    pub fn failure_for(&self, url: &str) -> Option<FailedUrl> {
        self.failures.lock().iter().find(|f| f.url == url).cloned()
    }

    // Builds the final report. Call once, after all workers have stopped.
    pub fn finalize(&self) -> Report {
        let end_time = Utc::now();
        let duration = self.started.elapsed().as_secs_f64();

        let total_pages_scraped = self.pages_scraped.load(Ordering::SeqCst);
        let total_urls_processed = self.urls_processed.load(Ordering::SeqCst);
        let failed_urls = self.failed_urls.load(Ordering::SeqCst);
        let success_rate = if total_urls_processed == 0 {
            0.0
        } else {
            total_pages_scraped as f64 / total_urls_processed as f64
        };

        let mut failures = std::mem::take(&mut *self.failures.lock());
        failures.sort_by(|a, b| a.url.cmp(&b.url));

        Report {
            data: std::mem::take(&mut *self.pages.lock()),
            stats: RunStats {
                total_pages_scraped,
                total_urls_processed,
                failed_urls,
                start_url: self.start_url.clone(),
                start_time: self.start_time,
                end_time,
                duration,
                success_rate,
                failures,
            },
        }
    }
}
