// src/fetch/http.rs
// =============================================================================
// Fetches one URL and classifies what came back.
//
// A fetch ends in exactly one of:
// - FetchedPage: 2xx with a parseable body (HTML or XML)
// - FetchFailure: with a Disposition telling the frontier whether the URL
//   deserves another attempt (Retryable) or is done for good (Terminal)
//
// The fetcher itself never retries or sleeps. Retrying is the frontier's
// decision and the backoff sleep belongs to the worker.
//
// Rust concepts:
// - Result<FetchedPage, FetchFailure>: failures are plain data, not panics
// - ? with map_err: turn reqwest errors into our own type at the boundary
// - Error::source(): walk the chain of causes behind one reqwest error
// =============================================================================

use super::detect::{self, ContentKind};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use tracing::debug;
use url::Url;

// Redirect hops reqwest follows before giving up
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Transient: timeouts, connection trouble, 5xx, 429
    Retryable,
    /// Permanent for this URL: 4xx, bad URL, unsupported content
    Terminal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub disposition: Disposition,
    /// Human-readable cause, ends up in the report's failure list
    pub reason: String,
    /// HTTP status when the server answered at all
    pub status: Option<u16>,
}

impl FetchFailure {
    fn retryable(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            disposition: Disposition::Retryable,
            reason: reason.into(),
            status,
        }
    }

    pub(crate) fn terminal(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            disposition: Disposition::Terminal,
            reason: reason.into(),
            status,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.disposition == Disposition::Retryable
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Where we ended up after following redirects
    pub final_url: Url,
    pub status: u16,
    /// The raw Content-Type header, if the server sent one
    pub content_type: Option<String>,
    pub kind: ContentKind,
    pub body: String,
}

// A thin wrapper around a reqwest Client configured for crawling
//
// Cheap to share: reqwest::Client is internally reference counted and pools
// connections across all workers.
pub struct Fetcher {
    client: Client,
    verify_ssl: bool,
}

impl Fetcher {
    pub fn new(timeout: Duration, verify_ssl: bool) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(!verify_ssl)
            .build()?;

        Ok(Self { client, verify_ssl })
    }

    // Fetches one URL
    //
    // Parameters:
    //   url: the URL to fetch (borrowed)
    //   headers: the rotated header set for this request (owned, moved in)
    //
    // Returns: the page, or a FetchFailure saying whether to retry
    pub async fn fetch(&self, url: &Url, headers: HeaderMap) -> Result<FetchedPage, FetchFailure> {
        if !self.verify_ssl {
            debug!(url = %url, phase = "fetch", trust = "degraded", "certificate verification disabled");
        }

        let response = self
            .client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await
            .map_err(|e| categorize_error(&e, self.verify_ssl))?;

        let status = response.status();
        if let Some(failure) = classify_status(status) {
            return Err(failure);
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Don't download bodies we already know we can't parse
        if detect::declared_kind(content_type.as_deref()) == Some(ContentKind::Other) {
            return Err(FetchFailure::terminal(
                format!(
                    "unsupported content type {}",
                    content_type.as_deref().unwrap_or_default()
                ),
                Some(status.as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| categorize_error(&e, self.verify_ssl))?;
        let kind = detect::detect(content_type.as_deref(), &body);

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            content_type,
            kind,
            body,
        })
    }
}

// Maps an HTTP status onto a failure, or None when the page is usable
//
// HTTP status codes:
// - 2xx: success
// - 408, 429: the server wants us to come back later -> retry
// - other 4xx: client error (404 not found, 410 gone, ...) -> terminal
// - 5xx: server error, often transient -> retry
// - 3xx left over after redirect following (304, 300) -> terminal
pub fn classify_status(status: StatusCode) -> Option<FetchFailure> {
    let code = status.as_u16();

    if status.is_success() {
        None
    } else if matches!(status, StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT) {
        Some(FetchFailure::retryable(format!("HTTP {}", code), Some(code)))
    } else if status.is_server_error() {
        Some(FetchFailure::retryable(format!("HTTP {}", code), Some(code)))
    } else {
        Some(FetchFailure::terminal(format!("HTTP {}", code), Some(code)))
    }
}

// Categorizes reqwest errors into retryable and terminal failures
//
// reqwest errors can happen for many reasons:
// - the server took longer than the request timeout -> retry
// - redirect loop or too many hops -> terminal
// - the request could not even be built (bad URL) -> terminal
// - TLS handshake refused the certificate -> terminal while verifying
// - refused connection, reset, truncated body -> retry
//
// Parameters:
//   error: the reqwest error (borrowed, we only inspect it)
//   verify_ssl: whether certificate checks were on for this request
//
// Returns: a FetchFailure with the full source chain as its reason
fn categorize_error(error: &reqwest::Error, verify_ssl: bool) -> FetchFailure {
    let chain = error_chain(error);

    if error.is_timeout() {
        FetchFailure::retryable("request timed out", None)
    } else if error.is_redirect() {
        FetchFailure::terminal("too many redirects", None)
    } else if error.is_builder() {
        FetchFailure::terminal(format!("malformed request: {}", chain), None)
    } else if is_tls_error(error) {
        // With verification on, a bad certificate will stay bad
        if verify_ssl {
            FetchFailure::terminal(format!("TLS error: {}", chain), None)
        } else {
            FetchFailure::retryable(format!("TLS handshake failed: {}", chain), None)
        }
    } else if error.is_connect() || error.is_request() || error.is_body() || error.is_decode() {
        FetchFailure::retryable(format!("connection failed: {}", chain), None)
    } else {
        FetchFailure::terminal(chain, None)
    }
}

// reqwest's Display only shows the outermost error, so the reason string
// joins every message in the source chain
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

// Whether a connect error came out of the TLS handshake
//
// rustls reports handshake failures (bad certificate, unknown issuer,
// protocol mismatch) as an io::Error of kind InvalidData somewhere in the
// source chain. A refused or reset TCP connection carries a different kind,
// so it stays a plain connection failure.
fn is_tls_error(error: &reqwest::Error) -> bool {
    if !error.is_connect() {
        return false;
    }

    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<io::Error>() {
            if io.kind() == io::ErrorKind::InvalidData {
                return true;
            }
        }
        source = inner.source();
    }
    false
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why check Content-Type before reading the body?
//    - response.text() downloads everything; for images or PDFs that is
//      wasted bandwidth on a page we would throw away
//
// 2. Why are TLS errors retryable when verification is off?
//    - Without certificate checks, a handshake failure is about the
//      connection (cipher, protocol, reset), not about trust, and may pass
//      on the next try
//
// 3. What does danger_accept_invalid_certs do?
//    - Skips certificate validation entirely; main warns once at startup and
//      every fetch logs it at debug level
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_millis(300), true).unwrap()
    }

    async fn fetch_path(server: &MockServer, p: &str) -> Result<FetchedPage, FetchFailure> {
        let url = Url::parse(&format!("{}{}", server.uri(), p)).unwrap();
        fetcher().fetch(&url, HeaderMap::new()).await
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR).unwrap().is_retryable());
        assert!(classify_status(StatusCode::BAD_GATEWAY).unwrap().is_retryable());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).unwrap().is_retryable());
        assert!(!classify_status(StatusCode::NOT_FOUND).unwrap().is_retryable());
        assert!(!classify_status(StatusCode::FORBIDDEN).unwrap().is_retryable());
        assert_eq!(classify_status(StatusCode::GONE).unwrap().status, Some(410));
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><title>Hi</title></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let page = fetch_path(&server, "/page").await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.kind, ContentKind::Html);
        assert!(page.body.contains("<title>Hi</title>"));
        assert_eq!(page.final_url.path(), "/page");
        assert_eq!(page.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_fetch_declared_xml() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "<!DOCTYPE html><html><title>Not really</title></html>",
                    "application/xml",
                ),
            )
            .mount(&server)
            .await;

        let page = fetch_path(&server, "/feed").await.unwrap();
        assert_eq!(page.kind, ContentKind::Xml);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let failure = fetch_path(&server, "/missing").await.unwrap_err();
        assert_eq!(failure.disposition, Disposition::Terminal);
        assert_eq!(failure.status, Some(404));
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let failure = fetch_path(&server, "/busy").await.unwrap_err();
        assert!(failure.is_retryable());
        assert_eq!(failure.status, Some(503));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let failure = fetch_path(&server, "/slow").await.unwrap_err();
        assert!(failure.is_retryable());
        assert_eq!(failure.reason, "request timed out");
    }

    #[tokio::test]
    async fn test_fetch_binary_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0x89u8, 0x50, 0x4e, 0x47], "image/png"),
            )
            .mount(&server)
            .await;

        let failure = fetch_path(&server, "/logo.png").await.unwrap_err();
        assert_eq!(failure.disposition, Disposition::Terminal);
        assert!(failure.reason.contains("image/png"));
    }

    // A local address nothing listens on
    fn closed_port_url(p: &str) -> Url {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Url::parse(&format!("http://127.0.0.1:{port}{p}")).unwrap()
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let url = closed_port_url("/gone");
        let failure = fetcher().fetch(&url, HeaderMap::new()).await.unwrap_err();
        assert!(failure.is_retryable());
        assert_eq!(failure.status, None);
        assert!(failure.reason.starts_with("connection failed"));
    }

    #[tokio::test]
    async fn test_tls_words_in_url_do_not_make_a_tls_error() {
        // Verification on: a real TLS failure would be terminal
        let url = closed_port_url("/docs/ssl-setup/certificate-tls");
        let failure = fetcher().fetch(&url, HeaderMap::new()).await.unwrap_err();
        assert_eq!(failure.disposition, Disposition::Retryable);
        assert!(!failure.reason.starts_with("TLS"));
    }

    #[tokio::test]
    async fn test_plain_http_errors_are_not_tls_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/ssl", server.uri())).unwrap();
        let client = Client::new();
        let error = client
            .get(url.as_str())
            .timeout(Duration::from_millis(50))
            .send()
            .await
            .unwrap_err();
        assert!(!is_tls_error(&error));
    }
}
