// src/fetch/headers.rs
// =============================================================================
// Fingerprint rotation.
//
// Every request goes out with a freshly picked User-Agent and
// Accept-Language so that consecutive requests don't share one obvious
// fingerprint. The rest of the header set mimics a regular browser.
// =============================================================================

use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, DNT, REFERER, USER_AGENT,
};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.5",
    "en-US,en;q=0.9",
    "en-GB,en;q=0.8",
    "en-US,en;q=0.8,de;q=0.5",
];

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

// Hands out a new header set for each request
//
// Stateless apart from the referer, so one rotator is shared by all workers.
#[derive(Debug, Clone)]
pub struct HeaderRotator {
    referer: Option<HeaderValue>,
}

impl HeaderRotator {
    pub fn new(referer: &str) -> Self {
        Self {
            referer: HeaderValue::from_str(referer).ok(),
        }
    }

    pub fn next_headers(&self) -> HeaderMap {
        let mut rng = rand::thread_rng();
        let user_agent = USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0]);
        let language = ACCEPT_LANGUAGES
            .choose(&mut rng)
            .copied()
            .unwrap_or(ACCEPT_LANGUAGES[0]);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(language));
        headers.insert(DNT, HeaderValue::from_static("1"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        if let Some(referer) = &self.referer {
            headers.insert(REFERER, referer.clone());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_headers_are_complete() {
        let rotator = HeaderRotator::new("https://example.com/");
        let headers = rotator.next_headers();
        assert!(headers.contains_key(USER_AGENT));
        assert!(headers.contains_key(ACCEPT_LANGUAGE));
        assert_eq!(headers[REFERER], "https://example.com/");
        assert_eq!(headers[DNT], "1");
    }

    #[test]
    fn test_user_agent_comes_from_pool() {
        let rotator = HeaderRotator::new("https://example.com/");
        let seen: HashSet<String> = (0..200)
            .map(|_| rotator.next_headers()[USER_AGENT].to_str().unwrap().to_string())
            .collect();
        assert!(seen.iter().all(|ua| USER_AGENTS.contains(&ua.as_str())));
        // 200 draws from 7 agents hitting just one is vanishingly unlikely
        assert!(seen.len() > 1);
    }
}
