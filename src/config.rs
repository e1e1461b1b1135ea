// src/config.rs
// =============================================================================
// Crawl configuration.
//
// The CLI (src/cli.rs) turns flags into a CrawlConfig; the crawler only ever
// sees a validated CrawlConfig. Validation failures are fatal startup errors:
// the run aborts before any fetch happens.
// =============================================================================

use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeed { url: String, reason: String },
    #[error("delays must be finite and non-negative (min {min}, max {max})")]
    NegativeDelay { min: f64, max: f64 },
    #[error("min delay ({min}s) is greater than max delay ({max}s)")]
    DelayRange { min: f64, max: f64 },
    #[error("{name} must be a non-negative number of seconds, got {value}")]
    InvalidSeconds { name: &'static str, value: f64 },
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
    #[error("backoff base ({base:?}) is greater than backoff cap ({max:?})")]
    BackoffRange { base: Duration, max: Duration },
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Where the crawl starts; also defines the site boundary
    pub seed: Url,
    /// Lower bound of the per-request jitter window
    pub min_delay: Duration,
    /// Upper bound of the per-request jitter window
    pub max_delay: Duration,
    /// How many times a retryable failure is retried before giving up
    pub max_retries: u32,
    pub max_workers: usize,
    pub verify_ssl: bool,
    /// Wall-clock limit for a single request
    pub request_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Stop dispatching new URLs once this many pages were scraped
    pub max_pages: Option<usize>,
    /// Treat a redirect that leaves the site as a terminal failure
    pub same_site_redirects_only: bool,
}

impl CrawlConfig {
    // Builds a config with defaults for everything except the seed
    pub fn new(seed: &str) -> Result<Self, ConfigError> {
        let seed = parse_seed(seed)?;
        Ok(Self {
            seed,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            max_retries: 3,
            max_workers: num_cpus::get().max(1),
            verify_ssl: true,
            request_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            max_pages: None,
            same_site_redirects_only: false,
        })
    }

    /// Sets the jitter window from seconds, rejecting negative or inverted ranges.
    pub fn with_delays(mut self, min_secs: f64, max_secs: f64) -> Result<Self, ConfigError> {
        if !min_secs.is_finite() || !max_secs.is_finite() || min_secs < 0.0 || max_secs < 0.0 {
            return Err(ConfigError::NegativeDelay { min: min_secs, max: max_secs });
        }
        if min_secs > max_secs {
            return Err(ConfigError::DelayRange { min: min_secs, max: max_secs });
        }
        self.min_delay = Duration::from_secs_f64(min_secs);
        self.max_delay = Duration::from_secs_f64(max_secs);
        Ok(self)
    }

    // Checks the invariants the crawler relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_delay > self.max_delay {
            return Err(ConfigError::DelayRange {
                min: self.min_delay.as_secs_f64(),
                max: self.max_delay.as_secs_f64(),
            });
        }
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.backoff_base > self.backoff_max {
            return Err(ConfigError::BackoffRange {
                base: self.backoff_base,
                max: self.backoff_max,
            });
        }
        Ok(())
    }
}

fn parse_seed(seed: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSeed {
        url: seed.to_string(),
        reason,
    };

    let url = Url::parse(seed).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none() {
        return Err(invalid("URL has no host".to_string()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CrawlConfig::new("https://example.com").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.min_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(3));
        assert!(config.max_workers >= 1);
        assert!(config.verify_ssl);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_seed() {
        assert!(matches!(
            CrawlConfig::new("not a url"),
            Err(ConfigError::InvalidSeed { .. })
        ));
        assert!(matches!(
            CrawlConfig::new("ftp://example.com/"),
            Err(ConfigError::InvalidSeed { .. })
        ));
    }

    #[test]
    fn test_rejects_inverted_delays() {
        let config = CrawlConfig::new("https://example.com").unwrap();
        assert_eq!(
            config.with_delays(3.0, 1.0).unwrap_err(),
            ConfigError::DelayRange { min: 3.0, max: 1.0 }
        );
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = CrawlConfig::new("https://example.com").unwrap();
        config.max_workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn test_rejects_backoff_range() {
        let mut config = CrawlConfig::new("https://example.com").unwrap();
        config.backoff_base = Duration::from_secs(60);
        assert!(matches!(config.validate(), Err(ConfigError::BackoffRange { .. })));
    }
}
