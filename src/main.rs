// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and build a CrawlConfig
// 2. Set up logging (file in --log-dir) and the progress bar
// 3. Run the crawl, with Ctrl-C wired to a graceful stop
// 4. Write the JSON report to --output or stdout
// 5. Exit with the proper code (0 = done, 130 = interrupted, 2 = fatal error)
//
// Per-page failures are part of the report, not errors: a crawl where half
// the pages 404 still exits with 0.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use site_scraper::progress::{BarProgress, NoProgress, ProgressSink};
use site_scraper::{logging, report, Crawler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

// Exit code after Ctrl-C, following the shell convention 128 + SIGINT
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // Fatal startup errors: bad configuration, unreachable seed, ...
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// This is the main application logic
// Returns:
//   Ok(0)   = crawl completed, report written
//   Ok(130) = interrupted by Ctrl-C, partial report written
//   Err     = fatal error, no report
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = cli.to_config().context("invalid configuration")?;

    // Keep the guard alive until run() returns so buffered log lines get flushed
    let _log_guard = logging::init(&cli.log_dir, cli.verbose)?;

    let progress: Arc<dyn ProgressSink> = if cli.quiet {
        Arc::new(NoProgress)
    } else {
        Arc::new(BarProgress::new())
    };

    let crawler = Crawler::new(config, progress).context("failed to start the crawler")?;

    // Ctrl-C stops dispatching new URLs; in-flight requests finish and the
    // partial report is still written
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let stop = crawler.stop_handle();
        let interrupted = interrupted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, waiting for in-flight requests");
                eprintln!("\nScraping interrupted, finishing in-flight requests...");
                interrupted.store(true, Ordering::SeqCst);
                stop.stop();
            }
        });
    }

    let report = match crawler.run().await {
        Ok(report) => report,
        Err(e) => {
            error!("crawl aborted: {}", e);
            return Err(e.into());
        }
    };

    report::write_report(&report, cli.output.as_deref()).context("failed to write the report")?;

    if interrupted.load(Ordering::SeqCst) {
        Ok(EXIT_INTERRUPTED)
    } else {
        Ok(0)
    }
}
