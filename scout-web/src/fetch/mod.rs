//! Page fetchers: the strategy that turns a URL or a keyword into raw HTML.
//!
//! Both backends report failures in-band through [`FetchResult::failed`];
//! nothing here returns an error for a single bad page.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use scout_common::{FetchBackend, SearchSettings};
use tracing::debug;

use crate::types::FetchResult;

pub mod browser;
pub mod http;

pub use browser::{BrowserFetcher, BrowserSession, FantocciniLauncher, SessionLauncher};
pub use http::HttpFetcher;

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Which backend this fetcher is.
    fn backend(&self) -> FetchBackend;

    /// Fetch one page. Failures come back as a [`FetchResult`] with `error`
    /// set and empty `html`.
    async fn fetch_url(&self, url: &str) -> FetchResult;

    /// Search for `keyword` and return the first results page, plus the
    /// second page when pagination succeeds.
    async fn fetch_keyword(&self, keyword: &str) -> FetchResult;
}

/// Fetch every URL with at most `limit` requests in flight.
///
/// The output has one slot per input, in input order, regardless of
/// completion order; a failed slot never cancels its siblings.
pub async fn fetch_all(fetcher: &dyn PageFetcher, urls: &[String], limit: usize) -> Vec<FetchResult> {
    let limit = limit.max(1);
    debug!(target: "fetch", urls = urls.len(), limit, "fetch.batch.start");
    let results: Vec<FetchResult> = stream::iter(urls.iter().map(|url| fetcher.fetch_url(url)))
        .buffered(limit)
        .collect()
        .await;
    debug!(
        target: "fetch",
        ok = results.iter().filter(|r| r.is_success()).count(),
        failed = results.iter().filter(|r| !r.is_success()).count(),
        "fetch.batch.done"
    );
    results
}

/// Build the fetcher selected by `settings.backend`.
pub fn build_fetcher(settings: &SearchSettings) -> anyhow::Result<Arc<dyn PageFetcher>> {
    Ok(match settings.backend {
        FetchBackend::Browser => Arc::new(BrowserFetcher::new(
            Arc::new(FantocciniLauncher::from_settings(settings)),
            settings,
        )),
        FetchBackend::Http => Arc::new(HttpFetcher::new(settings)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Later URLs finish first; URLs containing `fail` come back failed.
    struct SlowFirst {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for SlowFirst {
        fn backend(&self) -> FetchBackend {
            FetchBackend::Http
        }

        async fn fetch_url(&self, url: &str) -> FetchResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let idx: u64 = url.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(40 - idx * 8)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.contains("fail") {
                FetchResult::failed(url, "timeout")
            } else {
                FetchResult::page(url, format!("<p>{url}</p>"))
            }
        }

        async fn fetch_keyword(&self, keyword: &str) -> FetchResult {
            FetchResult::failed(keyword, "unused")
        }
    }

    #[tokio::test]
    async fn batch_keeps_input_order_and_isolates_failures() {
        let fetcher = SlowFirst {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let urls: Vec<String> = vec![
            "https://a.example/0".into(),
            "https://fail.example/1".into(),
            "https://c.example/2".into(),
            "https://d.example/3".into(),
        ];

        let results = fetch_all(&fetcher, &urls, 2).await;

        let targets: Vec<_> = results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, urls.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
        assert_eq!(results[1].error.as_deref(), Some("timeout"));
        assert!(results[2].is_success() && results[3].is_success());
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_limit_still_fetches() {
        let fetcher = SlowFirst {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let results = fetch_all(&fetcher, &["https://a.example/4".to_string()], 0).await;
        assert_eq!(results.len(), 1);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
    }
}
