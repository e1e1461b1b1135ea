// src/lib.rs
// =============================================================================
// site-scraper: a polite, parallel crawler for a single website.
//
// Modules:
// - crawl: the engine (frontier, workers, aggregator, politeness delays)
// - fetch: HTTP fetching, header rotation, content-type detection
// - parse: title / text / meta description / link extraction
// - site: URL normalization and the same-site boundary
// - config, logging, progress, report: the ambient pieces around the engine
//
// The binary in src/main.rs wires these together behind a CLI.
// =============================================================================

pub mod config;
pub mod crawl;
pub mod fetch;
pub mod logging;
pub mod parse;
pub mod progress;
pub mod report;
pub mod site;

pub use config::{ConfigError, CrawlConfig};
pub use crawl::{CrawlError, Crawler, StopHandle};
pub use report::Report;
