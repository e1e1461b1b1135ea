// src/crawl/mod.rs
// =============================================================================
// The crawl engine.
//
// A Crawler owns one CrawlContext shared by `max_workers` tokio tasks:
//
//   seed ─> Frontier ─claim─> worker ─> RateLimiter ─> Fetcher ─> Parser
//              ^                                                   │
//              └───────────── enqueue(links) ──────────────────────┤
//                                                                  v
//                                                              Aggregator
//
// run() returns once every worker has observed quiescence (or the run was
// cancelled and in-flight fetches wound down), then finalizes the report.
// =============================================================================

mod aggregate;
mod frontier;
mod politeness;
mod worker;

pub use aggregate::{Aggregator, PageResult};
pub use frontier::{ClaimedUrl, Frontier, FrontierError, Settlement, UrlRecord, UrlState};
pub use politeness::{Backoff, RateLimiter};

use crate::config::{ConfigError, CrawlConfig};
use crate::fetch::{Fetcher, HeaderRotator};
use crate::progress::ProgressSink;
use crate::report::Report;
use crate::site::{normalize, Site};
use futures::future::join_all;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};
use url::Url;

/// Errors that abort a run. Per-URL failures never show up here.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("seed URL {url} is unreachable: {reason}")]
    SeedUnreachable { url: String, reason: String },
}

// Everything the workers share. Only the frontier and the aggregator are
// mutable, and both synchronize internally.
pub(crate) struct CrawlContext {
    pub(crate) frontier: Arc<Frontier>,
    pub(crate) aggregator: Aggregator,
    pub(crate) fetcher: Fetcher,
    pub(crate) rotator: HeaderRotator,
    pub(crate) limiter: RateLimiter,
    pub(crate) backoff: Backoff,
    pub(crate) site: Site,
    pub(crate) progress: Arc<dyn ProgressSink>,
    pub(crate) max_pages: Option<usize>,
    pub(crate) max_retries: u32,
    pub(crate) same_site_redirects_only: bool,
}

/// Lets another task (e.g. a Ctrl-C handler) end the run early
#[derive(Clone)]
pub struct StopHandle {
    frontier: Arc<Frontier>,
}

impl StopHandle {
    // No new URLs are handed out after this; in-flight fetches finish normally
    pub fn stop(&self) {
        self.frontier.cancel();
    }
}

pub struct Crawler {
    ctx: Arc<CrawlContext>,
    seed: Url,
    workers: usize,
}

impl Crawler {
    pub fn new(config: CrawlConfig, progress: Arc<dyn ProgressSink>) -> Result<Self, CrawlError> {
        config.validate()?;

        let seed = normalize(&config.seed);
        let site = Site::of(&seed).ok_or_else(|| ConfigError::InvalidSeed {
            url: seed.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        let fetcher =
            Fetcher::new(config.request_timeout, config.verify_ssl).map_err(CrawlError::Client)?;

        if !config.verify_ssl {
            warn!("SSL certificate verification is disabled; fetched pages are not authenticated");
        }

        let ctx = CrawlContext {
            frontier: Arc::new(Frontier::new(config.max_retries)),
            aggregator: Aggregator::new(seed.as_str()),
            fetcher,
            rotator: HeaderRotator::new(seed.as_str()),
            limiter: RateLimiter::new(config.min_delay, config.max_delay),
            backoff: Backoff::new(config.backoff_base, config.backoff_max),
            site,
            progress,
            max_pages: config.max_pages,
            max_retries: config.max_retries,
            same_site_redirects_only: config.same_site_redirects_only,
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            seed,
            workers: config.max_workers,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            frontier: self.ctx.frontier.clone(),
        }
    }

    pub async fn run(self) -> Result<Report, CrawlError> {
        info!(seed = %self.seed, workers = self.workers, "starting crawl");
        self.ctx.frontier.enqueue(&self.seed, None);

        let handles: Vec<_> = (0..self.workers)
            .map(|id| {
                let ctx = self.ctx.clone();
                tokio::spawn(worker::run_worker(ctx).instrument(info_span!("worker", id)))
            })
            .collect();

        // A panicking worker settles its own URL (see ClaimGuard); the rest of
        // the pool keeps going
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("worker task failed: {}", e);
            }
        }
        self.ctx.progress.finish();

        // A seed that never answered at all means there was nothing to crawl
        if let Some(failure) = self.ctx.aggregator.failure_for(self.seed.as_str()) {
            if failure.status.is_none() {
                return Err(CrawlError::SeedUnreachable {
                    url: failure.url,
                    reason: failure.reason,
                });
            }
        }

        let report = self.ctx.aggregator.finalize();
        info!(
            pages = report.stats.total_pages_scraped,
            processed = report.stats.total_urls_processed,
            failed = report.stats.failed_urls,
            duration_secs = report.stats.duration,
            cancelled = self.ctx.frontier.is_cancelled(),
            "crawl finished"
        );
        Ok(report)
    }
}
