//! Minimal HTTP client for fetching HTML pages with safe logging and retries.
//!
//! - Request options: headers, query params, timeout, retries
//! - Sends browser-like `User-Agent`/`Accept-Language` headers by default
//! - Redacts sensitive query params before anything reaches the logs
//! - Retries network errors, 429 and 5xx with exponential backoff and `Retry-After` support
//! - Optional *raw* request/response logging via `SCOUT_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), scout_http::HttpError> {
//! use std::borrow::Cow;
//!
//! let client = scout_http::HttpClient::new()?;
//! let page = client
//!     .get_text(
//!         "https://www.baidu.com/s",
//!         scout_http::RequestOpts {
//!             query: Some(vec![("wd", Cow::Borrowed("rust"))]),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! println!("{} bytes from {}", page.body.len(), page.url);
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors.
//! Raw request/response lines go to target `http.raw` when `SCOUT_HTTP_RAW=1`.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use std::borrow::Cow;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

const RAW_ENV: &str = "SCOUT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";

const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn is_secret_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    SECRET_PARAMS.contains(&lower.as_str())
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use scout_http::RequestOpts;
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     query: Some(vec![("wd", Cow::Borrowed("rust"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.headers.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

/// A successfully fetched text body.
#[derive(Debug, Clone)]
pub struct TextResponse {
    /// Final URL after redirects; relative links in `body` resolve against it.
    pub url: Url,
    pub status: StatusCode,
    pub body: String,
}

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
    pub backoff_base: Duration,
}

impl HttpClient {
    /// Construct a client with browser-like default headers.
    ///
    /// ```no_run
    /// use scout_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new()?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new() -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(DEFAULT_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
            backoff_base: Duration::from_millis(200),
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Override the first retry delay; later retries double it.
    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(1).min(16) as u32);
        self.backoff_base.saturating_mul(factor)
    }

    /// GET `url` and return the decoded body.
    ///
    /// Non-2xx responses become [`HttpError::Api`] once the retry budget is
    /// spent; only 429 and 5xx are retried.
    pub async fn get_text(&self, url: &str, opts: RequestOpts<'_>) -> Result<TextResponse, HttpError> {
        let mut url = Url::parse(url).map_err(|e| HttpError::Url(e.to_string()))?;
        if let Some(q) = &opts.query {
            url.query_pairs_mut()
                .extend_pairs(q.iter().map(|(k, v)| (*k, v.as_ref())));
        }

        let (host_path, redacted_q) = redact_query(&url);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let mut attempt = 0usize;

        loop {
            let mut rb = self.inner.get(url.clone()).timeout(timeout);
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }

            let req_id = Uuid::new_v4();
            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                host_path=%host_path,
                query=?redacted_q,
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&url, opts.headers.as_ref());
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error.send");
                    return Err(HttpError::Network(message));
                }
            };

            let status = resp.status();
            let final_url = resp.url().clone();
            let headers = resp.headers().clone();
            let body = match resp.text().await {
                Ok(body) => body,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%message, "http.network_error.body");
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let request_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=body.len(),
                redirected=final_url != url,
                x_request_id=%request_id,
                "http.response.headers"
            );

            if raw_enabled() {
                let mut end = body.len().min(RAW_MAX_BODY);
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                let raw = &body[..end];
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    body=%raw,
                    truncated=end < body.len()
                );
            }

            let snippet = snip_body(&body);
            tracing::trace!(req_id=%req_id, body_snippet=%snippet, "http.response.body_snippet");

            if status.is_success() {
                return Ok(TextResponse {
                    url: final_url,
                    status,
                    body,
                });
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_retries {
                attempt += 1;
                let retry_after = retry_after_delay(&headers);
                let delay = retry_after.unwrap_or_else(|| self.backoff(attempt));
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    retry_after_secs=?retry_after.map(|d| d.as_secs()),
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                x_request_id=%request_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message: snippet,
                request_id,
            });
        }
    }
}

/// `Retry-After` in delta-seconds form, capped.
fn retry_after_delay(h: &HeaderMap) -> Option<Duration> {
    let secs: u64 = h.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

fn snip_body(body: &str) -> String {
    match body.char_indices().nth(500) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// "host + path" and the query pairs with secret values replaced.
fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if is_secret_param(&k) {
                "<redacted>".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    (host_path, redacted)
}

/// Best-effort curl repro line with secret query params and auth headers redacted.
fn make_curl(url: &Url, headers: Option<&HeaderMap>) -> String {
    let mut safe = url.clone();
    let pairs: Vec<(String, String)> = redact_query(url).1;
    if pairs.is_empty() {
        safe.set_query(None);
    } else {
        safe.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let mut parts = vec!["curl".to_string()];
    for (name, val) in headers.into_iter().flat_map(|h| h.iter()) {
        let v = if name.as_str().eq_ignore_ascii_case("authorization") || is_secret_param(name.as_str()) {
            "<redacted>"
        } else {
            val.to_str().unwrap_or("")
        };
        parts.push(format!("-H '{}: {}'", name.as_str(), v.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", safe.as_str()));
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new()
            .unwrap()
            .with_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn fetches_text_with_query_and_default_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/s"))
            .and(query_param("wd", "rust 异步"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let page = client()
            .get_text(
                &format!("{}/s", server.uri()),
                RequestOpts {
                    query: Some(vec![("wd", Cow::Borrowed("rust 异步"))]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(page.status, StatusCode::OK);
        assert_eq!(page.body, "<html>ok</html>");
        assert_eq!(page.url.path(), "/s");
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second"))
            .mount(&server)
            .await;

        let page = client()
            .get_text(&server.uri(), RequestOpts::default())
            .await
            .unwrap();
        assert_eq!(page.body, "second");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client()
            .get_text(&server.uri(), RequestOpts::default())
            .await
            .unwrap_err();
        match err {
            HttpError::Api { status, message, .. } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "gone");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let err = client()
            .with_retries(1)
            .get_text(&server.uri(), RequestOpts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Api { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn rejects_relative_url() {
        let err = client()
            .get_text("/s?wd=rust", RequestOpts::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::Url(_)));
    }

    #[test]
    fn secrets_are_redacted_for_logging() {
        let url = Url::parse("https://example.com/s?wd=rust&api_key=hunter2").unwrap();
        let (host_path, pairs) = redact_query(&url);
        assert_eq!(host_path, "example.com/s");
        assert_eq!(pairs[0], ("wd".to_string(), "rust".to_string()));
        assert_eq!(pairs[1], ("api_key".to_string(), "<redacted>".to_string()));
        assert!(!make_curl(&url, None).contains("hunter2"));
    }

    #[test]
    fn retry_after_is_capped() {
        let mut h = HeaderMap::new();
        h.insert(RETRY_AFTER, HeaderValue::from_static("3600"));
        assert_eq!(retry_after_delay(&h), Some(MAX_RETRY_AFTER));
        h.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after_delay(&h), Some(Duration::from_secs(2)));
    }
}
