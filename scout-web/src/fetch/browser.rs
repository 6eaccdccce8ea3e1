//! WebDriver-backed fetcher.
//!
//! Every call launches its own session and closes it before returning, on
//! success and failure alike. The session is reached through the
//! [`SessionLauncher`]/[`BrowserSession`] pair so the flow can run against
//! a scripted session in tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use scout_common::{EngineSelectors, FetchBackend, FetchTimings, SearchSettings, WaitWindow};
use scout_drivers::scout_browser::{
    behavioral::BehavioralEngine, driver::ScoutDriver, page::ScoutPage, stealth::StealthProfile,
};
use tracing::{debug, info, warn};

use super::PageFetcher;
use crate::types::FetchResult;

/// Slack added on top of the configured waits before a whole fetch is abandoned.
const SESSION_SLACK: Duration = Duration::from_secs(15);

/// One isolated browser session.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for DOMContentLoaded.
    async fn goto(&mut self, url: &str) -> Result<()>;
    /// Wait for `selector` to attach, then type `text` into it.
    async fn fill(&mut self, selector: &str, text: &str, timeout: Duration) -> Result<()>;
    /// Wait for `selector` to attach, then click it.
    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    /// Click the last element matching `selector`; `Ok(false)` when none exists.
    async fn click_last(&mut self, selector: &str) -> Result<bool>;
    /// Wait up to `timeout` for `selector` to attach.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    /// Current document HTML.
    async fn content(&mut self) -> Result<String>;
    /// Tear the session down; later calls fail.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Launches stealth-configured Chrome sessions through a WebDriver endpoint.
#[derive(Debug, Clone)]
pub struct FantocciniLauncher {
    webdriver_url: String,
    headless: bool,
    stealth: StealthProfile,
    page_load_timeout: Duration,
}

impl FantocciniLauncher {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            webdriver_url: settings.webdriver_url.clone(),
            headless: settings.headless,
            stealth: settings.stealth.into(),
            page_load_timeout: Duration::from_secs(settings.timings.navigation_timeout_secs),
        }
    }
}

#[async_trait]
impl SessionLauncher for FantocciniLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let driver = ScoutDriver::connect(
            &self.webdriver_url,
            self.headless,
            self.stealth,
            self.page_load_timeout,
        )
        .await?;
        Ok(Box::new(FantocciniSession {
            driver: Some(driver),
            page: None,
        }))
    }
}

struct FantocciniSession {
    driver: Option<ScoutDriver>,
    page: Option<ScoutPage>,
}

impl FantocciniSession {
    fn page(&self) -> Result<&ScoutPage> {
        self.page.as_ref().ok_or_else(|| anyhow!("no page loaded"))
    }
}

#[async_trait]
impl BrowserSession for FantocciniSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let driver = self.driver.as_mut().ok_or_else(|| anyhow!("session closed"))?;
        self.page = Some(driver.goto(url).await?);
        Ok(())
    }

    async fn fill(&mut self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        let input = page.wait_for_element(selector, timeout).await?;
        input.fill(text).await?;
        page.pause().await;
        Ok(())
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        self.page()?.wait_for_element(selector, timeout).await?.click().await
    }

    async fn click_last(&mut self, selector: &str) -> Result<bool> {
        let page = self.page()?;
        match page.find_elements(selector).await?.pop() {
            Some(control) => {
                page.pause().await;
                control.click().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        self.page()?.wait_for_element(selector, timeout).await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?.get_content().await
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        match self.driver.take() {
            Some(driver) => driver.close().await,
            None => Ok(()),
        }
    }
}

/// [`PageFetcher`] that drives a real browser.
pub struct BrowserFetcher {
    launcher: Arc<dyn SessionLauncher>,
    engine_url: String,
    selectors: EngineSelectors,
    timings: FetchTimings,
    behavior: BehavioralEngine,
}

impl BrowserFetcher {
    pub fn new(launcher: Arc<dyn SessionLauncher>, settings: &SearchSettings) -> Self {
        Self {
            launcher,
            engine_url: settings.engine_url.clone(),
            selectors: settings.selectors.clone(),
            timings: settings.timings.clone(),
            behavior: BehavioralEngine::new(),
        }
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.timings.navigation_timeout_secs)
    }

    fn session_budget(&self, windows: &[WaitWindow]) -> Duration {
        let waits: u64 = windows.iter().map(|w| w.max.max(w.min)).sum();
        self.navigation_timeout() * 3 + Duration::from_millis(waits) + SESSION_SLACK
    }

    async fn release(&self, session: &mut dyn BrowserSession, target: &str) {
        if let Err(e) = session.close().await {
            warn!(target: "fetch.browser", item = %target, error = %e, "fetch.session.close_failed");
        }
    }

    async fn search_pages(&self, session: &mut dyn BrowserSession, keyword: &str) -> Result<Vec<String>> {
        let nav = self.navigation_timeout();
        session.goto(&self.engine_url).await?;
        session.fill(&self.selectors.query_input, keyword, nav).await?;
        session.click(&self.selectors.submit, nav).await?;

        let wait = self.behavior.jitter(self.timings.results_wait_ms);
        session
            .wait_for(&self.selectors.results_container, wait)
            .await
            .with_context(|| format!("results container did not attach within {}ms", wait.as_millis()))?;
        let first = session.content().await?;
        let second = self.next_page(session, &first).await;

        let mut pages = vec![first];
        match second {
            Ok(Some(second)) => pages.push(second),
            Ok(None) => {
                info!(target: "fetch.browser", %keyword, "fetch.keyword.page2_missing");
            }
            Err(e) => {
                warn!(target: "fetch.browser", %keyword, error = %format!("{e:#}"), "fetch.keyword.page2_failed");
            }
        }
        Ok(pages)
    }

    /// Follow the next-page control once; `None` when there is no control
    /// or the second page is indistinguishable from the first.
    async fn next_page(&self, session: &mut dyn BrowserSession, first: &str) -> Result<Option<String>> {
        if !session.click_last(&self.selectors.next_page).await? {
            return Ok(None);
        }
        let wait = self.behavior.jitter(self.timings.next_page_wait_ms);
        session.wait_for(&self.selectors.results_container, wait).await?;
        let second = session.content().await?;
        if second.trim().is_empty() {
            debug!(target: "fetch.browser", "fetch.keyword.page2_blank");
            return Ok(None);
        }
        if second == first {
            debug!(target: "fetch.browser", "fetch.keyword.page2_unchanged");
            return Ok(None);
        }
        Ok(Some(second))
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn backend(&self) -> FetchBackend {
        FetchBackend::Browser
    }

    async fn fetch_url(&self, url: &str) -> FetchResult {
        debug!(target: "fetch.browser", %url, "fetch.url.start");
        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => return launch_failed(url, e),
        };
        let outcome = deadline(self.session_budget(&[]), async {
            session.goto(url).await?;
            session.content().await
        })
        .await;
        self.release(session.as_mut(), url).await;

        match outcome {
            Ok(html) => {
                debug!(target: "fetch.browser", %url, bytes = html.len(), "fetch.url.done");
                FetchResult::page(url, html)
            }
            Err(e) => {
                warn!(target: "fetch.browser", %url, error = %format!("{e:#}"), "fetch.url.failed");
                FetchResult::failed(url, format!("{e:#}"))
            }
        }
    }

    async fn fetch_keyword(&self, keyword: &str) -> FetchResult {
        debug!(target: "fetch.browser", %keyword, "fetch.keyword.start");
        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => return launch_failed(keyword, e),
        };
        let budget = self.session_budget(&[self.timings.results_wait_ms, self.timings.next_page_wait_ms]);
        let outcome = deadline(budget, self.search_pages(session.as_mut(), keyword)).await;
        self.release(session.as_mut(), keyword).await;

        match outcome {
            Ok(pages) => {
                debug!(target: "fetch.browser", %keyword, pages = pages.len(), "fetch.keyword.done");
                FetchResult::pages(keyword, pages)
            }
            Err(e) => {
                warn!(target: "fetch.browser", %keyword, error = %format!("{e:#}"), "fetch.keyword.failed");
                FetchResult::failed(keyword, format!("{e:#}"))
            }
        }
    }
}

/// Run `flow`, failing once `budget` elapses.
async fn deadline<T>(budget: Duration, flow: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(budget, flow)
        .await
        .unwrap_or_else(|_| Err(anyhow!("gave up after {}s", budget.as_secs())))
}

fn launch_failed(target: &str, error: anyhow::Error) -> FetchResult {
    let error = error.context("launching browser session");
    warn!(target: "fetch.browser", item = %target, error = %format!("{error:#}"), "fetch.session.launch_failed");
    FetchResult::failed(target, format!("{error:#}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct Script {
        fail_launch: bool,
        fail_goto: bool,
        has_next: bool,
        page2_same: bool,
        page2_blank: bool,
        page2_times_out: bool,
    }

    #[derive(Default)]
    struct Journal {
        launched: usize,
        closed: usize,
        typed: Vec<String>,
    }

    struct ScriptedLauncher {
        script: Script,
        journal: Arc<Mutex<Journal>>,
    }

    struct ScriptedSession {
        script: Script,
        journal: Arc<Mutex<Journal>>,
        on_page2: bool,
    }

    #[async_trait]
    impl SessionLauncher for ScriptedLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
            if self.script.fail_launch {
                return Err(anyhow!("webdriver unreachable"));
            }
            self.journal.lock().unwrap().launched += 1;
            Ok(Box::new(ScriptedSession {
                script: self.script.clone(),
                journal: self.journal.clone(),
                on_page2: false,
            }))
        }
    }

    #[async_trait]
    impl BrowserSession for ScriptedSession {
        async fn goto(&mut self, url: &str) -> Result<()> {
            if self.script.fail_goto {
                return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED at {url}"));
            }
            Ok(())
        }

        async fn fill(&mut self, _selector: &str, text: &str, _timeout: Duration) -> Result<()> {
            self.journal.lock().unwrap().typed.push(text.to_string());
            Ok(())
        }

        async fn click(&mut self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn click_last(&mut self, _selector: &str) -> Result<bool> {
            if self.script.has_next {
                self.on_page2 = true;
            }
            Ok(self.script.has_next)
        }

        async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<()> {
            if self.on_page2 && self.script.page2_times_out {
                return Err(anyhow!("timed out waiting for #content_left"));
            }
            Ok(())
        }

        async fn content(&mut self) -> Result<String> {
            Ok(if self.on_page2 && self.script.page2_blank {
                String::new()
            } else if self.on_page2 && !self.script.page2_same {
                "<html>page 2</html>".to_string()
            } else {
                "<html>page 1</html>".to_string()
            })
        }

        async fn close(&mut self) -> Result<()> {
            self.journal.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    fn fetcher(script: Script) -> (BrowserFetcher, Arc<Mutex<Journal>>) {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut settings = SearchSettings::default();
        settings.timings.results_wait_ms = WaitWindow::new(0, 0);
        settings.timings.next_page_wait_ms = WaitWindow::new(0, 0);
        let launcher = ScriptedLauncher {
            script,
            journal: journal.clone(),
        };
        (BrowserFetcher::new(Arc::new(launcher), &settings), journal)
    }

    #[tokio::test]
    async fn keyword_without_next_control_has_one_page() {
        let (fetcher, journal) = fetcher(Script::default());
        let result = fetcher.fetch_keyword("rust").await;
        assert!(result.is_success());
        assert_eq!(result.pages, ["<html>page 1</html>"]);
        let journal = journal.lock().unwrap();
        assert_eq!(journal.typed, ["rust"]);
        assert_eq!((journal.launched, journal.closed), (1, 1));
    }

    #[tokio::test]
    async fn keyword_follows_next_page_once() {
        let (fetcher, _) = fetcher(Script {
            has_next: true,
            ..Script::default()
        });
        let result = fetcher.fetch_keyword("rust").await;
        assert_eq!(result.pages, ["<html>page 1</html>", "<html>page 2</html>"]);
        assert_eq!(result.html, "<html>page 1</html>");
    }

    #[tokio::test]
    async fn unchanged_blank_or_stalled_second_page_is_dropped() {
        for script in [
            Script { has_next: true, page2_same: true, ..Script::default() },
            Script { has_next: true, page2_blank: true, ..Script::default() },
            Script { has_next: true, page2_times_out: true, ..Script::default() },
        ] {
            let (fetcher, journal) = fetcher(script);
            let result = fetcher.fetch_keyword("rust").await;
            assert!(result.is_success());
            assert_eq!(result.pages.len(), 1);
            assert_eq!(journal.lock().unwrap().closed, 1);
        }
    }

    #[tokio::test]
    async fn navigation_failure_is_reported_and_session_closed() {
        let (fetcher, journal) = fetcher(Script {
            fail_goto: true,
            ..Script::default()
        });
        let url_result = fetcher.fetch_url("https://unreachable.example/").await;
        assert!(!url_result.is_success());
        assert!(url_result.html.is_empty());
        assert!(url_result.error.as_deref().unwrap_or_default().contains("ERR_NAME_NOT_RESOLVED"));

        let kw_result = fetcher.fetch_keyword("rust").await;
        assert!(!kw_result.is_success());

        let journal = journal.lock().unwrap();
        assert_eq!((journal.launched, journal.closed), (2, 2));
    }

    #[tokio::test]
    async fn launch_failure_is_per_item() {
        let (fetcher, _) = fetcher(Script {
            fail_launch: true,
            ..Script::default()
        });
        let result = fetcher.fetch_url("https://a.example/").await;
        assert!(result.error.as_deref().unwrap_or_default().contains("launching browser session"));
    }

    #[tokio::test]
    async fn url_fetch_returns_document() {
        let (fetcher, journal) = fetcher(Script::default());
        let result = fetcher.fetch_url("https://a.example/").await;
        assert_eq!(result.html, "<html>page 1</html>");
        assert_eq!(result.pages.len(), 1);
        assert_eq!(journal.lock().unwrap().closed, 1);
    }

    #[tokio::test]
    #[ignore] // needs chromedriver on localhost:9515
    async fn live_keyword_fetch() {
        let settings = SearchSettings::default();
        let fetcher = BrowserFetcher::new(Arc::new(FantocciniLauncher::from_settings(&settings)), &settings);
        let result = fetcher.fetch_keyword("rust 语言").await;
        assert!(result.is_success(), "{:?}", result.error);
    }
}
