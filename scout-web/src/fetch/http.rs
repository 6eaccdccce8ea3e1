//! Plain-HTTP fetcher: no script execution, results pages come straight
//! from the engine's search URL.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scout_common::{FetchBackend, SearchSettings};
use scout_drivers::scout_browser::fingerprint::UserAgentManager;
use scout_http::{HttpClient, RequestOpts, TextResponse};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::{Url, form_urlencoded};

use super::PageFetcher;
use crate::types::FetchResult;

pub struct HttpFetcher {
    client: HttpClient,
    search_url: String,
    next_page: Selector,
    headers: HeaderMap,
}

impl HttpFetcher {
    /// Fails when the next-page selector does not parse or the client
    /// cannot be built.
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let next_page = Selector::parse(&settings.selectors.next_page)
            .map_err(|e| anyhow!("invalid next_page selector {:?}: {e:?}", settings.selectors.next_page))?;
        let client = HttpClient::new()?
            .with_timeout(Duration::from_secs(settings.timings.http_timeout_secs))
            .with_retries(settings.timings.http_retries);

        let mut headers = HeaderMap::new();
        let user_agent = UserAgentManager::new().user_agent();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent).context("user agent is not a valid header value")?,
        );

        Ok(Self {
            client,
            search_url: settings.search_url.clone(),
            next_page,
            headers,
        })
    }

    fn keyword_url(&self, keyword: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
        self.search_url.replace("{query}", &encoded)
    }

    async fn get(&self, url: &str) -> Result<TextResponse> {
        let opts = RequestOpts {
            headers: Some(self.headers.clone()),
            ..Default::default()
        };
        Ok(self.client.get_text(url, opts).await?)
    }

    /// Absolute URL of the last next-page control on `page`.
    fn next_page_url(&self, page: &TextResponse) -> Option<Url> {
        let document = Html::parse_document(&page.body);
        let href = document
            .select(&self.next_page)
            .filter_map(|a| a.value().attr("href"))
            .last()?;
        page.url.join(href).ok()
    }

    async fn second_page(&self, first: &TextResponse) -> Result<Option<String>> {
        let Some(next) = self.next_page_url(first) else {
            return Ok(None);
        };
        let second = self.get(next.as_str()).await?;
        if second.body.trim().is_empty() {
            debug!(target: "fetch.http", "fetch.keyword.page2_blank");
            return Ok(None);
        }
        if second.body == first.body {
            debug!(target: "fetch.http", "fetch.keyword.page2_unchanged");
            return Ok(None);
        }
        Ok(Some(second.body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn backend(&self) -> FetchBackend {
        FetchBackend::Http
    }

    async fn fetch_url(&self, url: &str) -> FetchResult {
        debug!(target: "fetch.http", %url, "fetch.url.start");
        match self.get(url).await {
            Ok(page) => {
                debug!(target: "fetch.http", %url, bytes = page.body.len(), "fetch.url.done");
                FetchResult::page(url, page.body)
            }
            Err(e) => {
                warn!(target: "fetch.http", %url, error = %e, "fetch.url.failed");
                FetchResult::failed(url, e.to_string())
            }
        }
    }

    async fn fetch_keyword(&self, keyword: &str) -> FetchResult {
        let url = self.keyword_url(keyword);
        debug!(target: "fetch.http", %keyword, %url, "fetch.keyword.start");

        let first = match self.get(&url).await {
            Ok(first) => first,
            Err(e) => {
                warn!(target: "fetch.http", %keyword, error = %e, "fetch.keyword.failed");
                return FetchResult::failed(keyword, e.to_string());
            }
        };

        let mut pages = Vec::with_capacity(2);
        let second = self.second_page(&first).await;
        pages.push(first.body);
        match second {
            Ok(Some(body)) => pages.push(body),
            Ok(None) => info!(target: "fetch.http", %keyword, "fetch.keyword.page2_missing"),
            Err(e) => warn!(target: "fetch.http", %keyword, error = %e, "fetch.keyword.page2_failed"),
        }
        debug!(target: "fetch.http", %keyword, pages = pages.len(), "fetch.keyword.done");
        FetchResult::pages(keyword, pages)
    }
}
