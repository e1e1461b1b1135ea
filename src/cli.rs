// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// One positional argument (the URL to start from) plus flags that map onto
// CrawlConfig. Anything clap can't check by itself (delay ordering, URL
// scheme, ...) is validated by CrawlConfig.
// =============================================================================

use clap::Parser;
use site_scraper::{ConfigError, CrawlConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "site-scraper",
    version,
    about = "Crawl a website and scrape titles, text and meta descriptions",
    long_about = "site-scraper starts from one URL, follows every same-site link with a pool of \
                  parallel workers, and prints a JSON document with the content of every page \
                  plus run statistics. Requests are spaced out with random delays and retried \
                  with exponential backoff."
)]
pub struct Cli {
    /// URL to start crawling from (e.g., https://example.com)
    pub url: String,

    /// Minimum delay between requests of one worker (seconds)
    #[arg(long, default_value_t = 1.0)]
    pub min_delay: f64,

    /// Maximum delay between requests of one worker (seconds)
    #[arg(long, default_value_t = 3.0)]
    pub max_delay: f64,

    /// How many times a failed request is retried
    #[arg(long = "retries", default_value_t = 3)]
    pub max_retries: u32,

    /// Number of parallel workers (default: CPU count)
    #[arg(long = "workers")]
    pub max_workers: Option<usize>,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub no_verify_ssl: bool,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Write the JSON report to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Don't show the progress bar
    #[arg(long)]
    pub quiet: bool,

    /// Per-request timeout (seconds)
    #[arg(long, default_value_t = 30.0)]
    pub timeout: f64,

    /// Base delay of the exponential retry backoff (seconds)
    #[arg(long, default_value_t = 1.0)]
    pub backoff_base: f64,

    /// Upper bound of the retry backoff (seconds)
    #[arg(long, default_value_t = 30.0)]
    pub backoff_max: f64,

    /// Stop after this many pages have been scraped
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Count redirects that leave the site as failures instead of following them
    #[arg(long)]
    pub same_site_redirects_only: bool,

    /// Also log to stderr (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    // Turns the parsed flags into a validated crawl configuration
    pub fn to_config(&self) -> Result<CrawlConfig, ConfigError> {
        let mut config = CrawlConfig::new(&self.url)?.with_delays(self.min_delay, self.max_delay)?;

        config.max_retries = self.max_retries;
        if let Some(workers) = self.max_workers {
            config.max_workers = workers;
        }
        config.verify_ssl = !self.no_verify_ssl;
        config.request_timeout = seconds("timeout", self.timeout)?;
        config.backoff_base = seconds("backoff base", self.backoff_base)?;
        config.backoff_max = seconds("backoff max", self.backoff_max)?;
        config.max_pages = self.max_pages;
        config.same_site_redirects_only = self.same_site_redirects_only;

        config.validate()?;
        Ok(config)
    }
}

fn seconds(name: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::InvalidSeconds { name, value })
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why Option<usize> for --workers?
//    - The default (CPU count) is only known at runtime
//    - None means "keep CrawlConfig's default"
//
// 2. What does ArgAction::Count do?
//    - Counts how often a flag appears: -v = 1, -vv = 2
// -----------------------------------------------------------------------------
