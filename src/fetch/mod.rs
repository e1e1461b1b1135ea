// src/fetch/mod.rs
// =============================================================================
// Everything that touches the network for a single URL.
//
// Submodules:
// - http: performs the GET and classifies the outcome
// - detect: decides whether a body is HTML, XML or something else
// - headers: rotates User-Agent and friends between requests
// =============================================================================

mod detect;
mod headers;
mod http;

pub use detect::ContentKind;
pub use headers::HeaderRotator;
pub use http::{FetchFailure, FetchedPage, Fetcher};
