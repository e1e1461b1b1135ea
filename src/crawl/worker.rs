// src/crawl/worker.rs
// =============================================================================
// One crawl worker.
//
// Loop:
// 1. claim() a URL from the frontier (None = crawl finished, exit)
// 2. back off if this is a retry, then wait out the rate limiter
// 3. fetch with a freshly rotated header set
// 4. success: parse, enqueue links, record the page, report success
//    failure: report to the frontier, which decides retry vs give up
// 5. push a progress update
//
// Per-URL errors never leave this file: they are turned into frontier
// settlements and aggregator entries.
//
// Rust concepts:
// - Arc<CrawlContext>: every worker shares one context, no copies
// - while let: loop until claim() says the crawl is over
// - Drop: ClaimGuard cleans up even if the worker panics mid-fetch
// =============================================================================

use super::aggregate::PageResult;
use super::frontier::Settlement;
use super::CrawlContext;
use crate::fetch::{FetchFailure, FetchedPage};
use crate::parse;
use crate::report::FailedUrl;
use crate::site::normalize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

// Runs one worker until the frontier is drained or the run is cancelled
//
// Parameters:
//   ctx: the shared crawl context (frontier, fetcher, aggregator, ...)
pub(crate) async fn run_worker(ctx: Arc<CrawlContext>) {
    debug!("worker started");

    while let Some(claimed) = ctx.frontier.claim().await {
        let mut guard = ClaimGuard::new(&ctx, &claimed.url);

        // A retry waits for the backoff first, then for the usual jitter
        if claimed.attempts > 0 {
            let delay = ctx.backoff.delay(claimed.attempts);
            debug!(
                url = %claimed.url,
                phase = "fetch",
                attempt = claimed.attempts + 1,
                delay_ms = delay.as_millis() as u64,
                "backing off before retry"
            );
            tokio::time::sleep(delay).await;
        }
        ctx.limiter.wait().await;

        let headers = ctx.rotator.next_headers();
        match ctx.fetcher.fetch(&claimed.url, headers).await {
            Ok(page) => handle_page(&ctx, &claimed.url, claimed.attempts, page),
            Err(failure) => handle_failure(&ctx, &claimed.url, failure),
        }
        guard.disarm();

        let (settled, known) = ctx.frontier.progress();
        ctx.progress.update(settled, known);
    }

    debug!("frontier drained, worker exiting");
}

// Handles a successful fetch
//
// Parameters:
//   ctx: the shared crawl context
//   url: the URL that was claimed (before any redirect)
//   attempts: retries granted before this fetch
//   page: what the fetcher brought back
//
// The claimed URL is always settled as a success here, except for an
// off-site redirect under `same_site_redirects_only`, which is a failure.
fn handle_page(ctx: &CrawlContext, url: &Url, attempts: u32, page: FetchedPage) {
    // The final redirect target is the canonical URL of the page
    let canonical = normalize(&page.final_url);
    if canonical != *url {
        if ctx.same_site_redirects_only && !ctx.site.contains(&canonical) {
            let reason = format!("redirected off-site to {}", canonical);
            handle_failure(ctx, url, FetchFailure::terminal(reason, Some(page.status)));
            return;
        }

        // The target has its own record that is in flight or already
        // settled: that fetch owns the page, so this one is dropped
        if !ctx.frontier.mark_seen(&canonical) {
            debug!(
                url = %url,
                phase = "enqueue",
                target = %canonical,
                "redirect target handled elsewhere, page not recorded"
            );
            if let Err(e) = ctx.frontier.report_success(url) {
                error!(url = %url, phase = "fetch", "frontier rejected success report: {}", e);
            }
            return;
        }
    }

    let parsed = parse::parse(&page.body, page.kind, &page.final_url, &ctx.site);

    let mut added = 0;
    for link in &parsed.links {
        if ctx.frontier.enqueue(link, Some(url)) {
            added += 1;
        }
    }
    debug!(
        url = %url,
        phase = "enqueue",
        found = parsed.links.len(),
        new = added,
        "links queued"
    );

    ctx.aggregator.record_page(PageResult {
        url: canonical.to_string(),
        title: parsed.title,
        text: parsed.text,
        meta_description: parsed.meta_description,
        content_type: page.kind,
    });
    let scraped = ctx.aggregator.record_success();

    if let Err(e) = ctx.frontier.report_success(url) {
        error!(url = %url, phase = "fetch", "frontier rejected success report: {}", e);
    }
    info!(
        url = %url,
        phase = "parse",
        status = page.status,
        kind = page.kind.as_str(),
        content_type = page.content_type.as_deref().unwrap_or("-"),
        attempt = attempts + 1,
        "scraped"
    );

    // Cancel once, from whichever worker crosses the limit
    if let Some(max_pages) = ctx.max_pages {
        if scraped >= max_pages && !ctx.frontier.is_cancelled() {
            info!(max_pages, "page limit reached, stopping dispatch");
            ctx.frontier.cancel();
        }
    }
}

// Hands a failed fetch to the frontier and records it if it was final
//
// Parameters:
//   ctx: the shared crawl context
//   url: the URL that failed
//   failure: why, and whether it is worth retrying
fn handle_failure(ctx: &CrawlContext, url: &Url, failure: FetchFailure) {
    match ctx.frontier.report_failure(url, failure.is_retryable()) {
        Ok(Settlement::Requeued { attempts }) => {
            warn!(
                url = %url,
                phase = "fetch",
                attempt = attempts,
                max_retries = ctx.max_retries,
                "fetch failed, will retry: {}",
                failure.reason
            );
        }
        Ok(Settlement::Failed { attempts }) => {
            warn!(
                url = %url,
                phase = "fetch",
                attempts,
                "giving up: {}",
                failure.reason
            );
            ctx.aggregator.record_failure(FailedUrl {
                url: url.to_string(),
                reason: failure.reason,
                status: failure.status,
                attempts,
            });
        }
        Err(e) => {
            error!(url = %url, phase = "fetch", "frontier rejected failure report: {}", e);
        }
    }
}

// Settles a claimed URL as failed if the worker never got to report on it
//
// Without this, a worker that panics mid-fetch would leave its URL InFlight
// forever and every idle peer would wait on it.
struct ClaimGuard<'a> {
    ctx: &'a CrawlContext,
    url: &'a Url,
    armed: bool,
}

impl<'a> ClaimGuard<'a> {
    fn new(ctx: &'a CrawlContext, url: &'a Url) -> Self {
        Self {
            ctx,
            url,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        error!(url = %self.url, "worker stopped before settling its URL");
        if let Ok(Settlement::Failed { attempts }) = self.ctx.frontier.report_failure(self.url, false) {
            self.ctx.aggregator.record_failure(FailedUrl {
                url: self.url.to_string(),
                reason: "worker aborted".to_string(),
                status: None,
                attempts,
            });
        }
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why is the backoff sleep here and not in the fetcher?
//    - The fetcher answers "what happened", the frontier decides "try again?"
//    - The worker is the only piece that knows a URL is being retried, so it
//      owns the wait
//
// 2. Redirects and dedup
//    - reqwest follows redirects for us; page.final_url is where we ended up
//    - mark_seen() decides who owns the final URL, so a document reached via
//      /old and via /new is only recorded once
//
// 3. Why a guard instead of catch_unwind?
//    - Drop runs during unwinding, so a panic still settles the URL and the
//      other workers don't wait forever for it
// -----------------------------------------------------------------------------
