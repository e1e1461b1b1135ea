// src/site.rs
// =============================================================================
// URL helpers shared by the parser and the frontier.
//
// - normalize(): collapses equivalent URLs onto one dedup key
// - Site: the scheme+host(+port) boundary that link-following stays inside
// - resolve_link(): turns an href into an absolute URL (or skips it)
// =============================================================================

use url::Url;

// The boundary of a crawl: two URLs are on the same site when their scheme,
// host and effective port all match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Site {
    /// Builds the site boundary from any URL on that site.
    ///
    /// Returns None for URLs without a host (mailto:, data:, file:///...).
    pub fn of(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        Some(Self {
            scheme: url.scheme().to_string(),
            host: host.to_ascii_lowercase(),
            port: url.port_or_known_default(),
        })
    }

    pub fn contains(&self, url: &Url) -> bool {
        url.scheme() == self.scheme
            && url
                .host_str()
                .map_or(false, |h| h.eq_ignore_ascii_case(&self.host))
            && url.port_or_known_default() == self.port
    }
}

// Normalizes a URL so that equivalent spellings share one dedup key
//
// The url crate already lowercases scheme and host and drops default ports.
// On top of that we:
//   - strip the fragment (#section points at the same document)
//   - strip a trailing slash from every path except the root "/"
//
// The query string is kept: ?page=2 is a different document.
pub fn normalize(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let path = normalized.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let trimmed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        normalized.set_path(&trimmed);
    }

    normalized
}

// Resolves a link (possibly relative) to an absolute http(s) URL
//
// Returns None for anchors, special protocols and anything that does not
// parse.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }

    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url),
        _ => None,
    }
}
