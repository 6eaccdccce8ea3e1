//! Common types and utilities shared across Scout crates.
//!
//! This crate defines the search settings, feature enums, observability
//! helpers, and shared error type used throughout the Scout workspace. It is
//! intentionally lightweight so that every crate can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`SearchSettings`]: engine entry point, selectors, fetch backend and timings
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`ScoutError`] and [`Result`]: Shared error handling
//! - Enums describing behavior such as [`StealthLevel`] and [`FetchBackend`]
//!
//! # Examples
//!
//! Constructing default settings:
//!
//! ```rust
//! use scout_common::{FetchBackend, SearchSettings, StealthLevel};
//!
//! let mut settings = SearchSettings::default();
//! settings.stealth = StealthLevel::Maximum;
//! assert_eq!(settings.backend, FetchBackend::Browser);
//! assert_eq!(settings.max_concurrent_fetches, 8);
//! assert!(settings.validate().is_ok());
//! ```
use serde::{Deserialize, Serialize};
use url::Url;

pub mod observability;

/// Which [`PageFetcher`](https://docs.rs/scout-web) implementation drives fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Headless browser over WebDriver.
    Browser,
    /// Plain HTTP requests, no script execution.
    Http,
}

impl std::fmt::Display for FetchBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Browser => f.write_str("browser"),
            Self::Http => f.write_str("http"),
        }
    }
}

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    Balanced,
    Maximum,
}

/// Inclusive millisecond range a randomized wait is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitWindow {
    pub min: u64,
    pub max: u64,
}

impl WaitWindow {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

/// CSS selectors describing the search engine's page structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSelectors {
    /// Query text input on the engine's landing page.
    pub query_input: String,
    /// Button that submits the query.
    pub submit: String,
    /// Container that holds the result cards once results have rendered.
    pub results_container: String,
    /// Pagination control(s); the last match is taken as "next page".
    pub next_page: String,
}

impl Default for EngineSelectors {
    fn default() -> Self {
        Self {
            query_input: "input[name=\"wd\"]".to_string(),
            submit: "#su".to_string(),
            results_container: "#content_left".to_string(),
            next_page: "#page a.n".to_string(),
        }
    }
}

/// Timeouts, randomized wait windows and retry budgets for fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchTimings {
    /// Upper bound for a single navigation to reach DOMContentLoaded.
    pub navigation_timeout_secs: u64,
    /// Window for the results container to attach after submitting a query.
    pub results_wait_ms: WaitWindow,
    /// Window for the second results page to settle after clicking "next".
    pub next_page_wait_ms: WaitWindow,
    /// Per-request timeout for the HTTP backend.
    pub http_timeout_secs: u64,
    /// Retry budget for the HTTP backend (429/5xx/network errors).
    pub http_retries: usize,
}

impl Default for FetchTimings {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: 30,
            results_wait_ms: WaitWindow::new(6_000, 10_000),
            next_page_wait_ms: WaitWindow::new(10_000, 15_000),
            http_timeout_secs: 15,
            http_retries: 2,
        }
    }
}

/// Settings for the search pipeline.
///
/// Read once at startup and shared immutably afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Landing page where the browser backend types the query.
    pub engine_url: String,
    /// Results URL template used by the HTTP backend; `{query}` is replaced
    /// with the percent-encoded keyword.
    pub search_url: String,
    pub backend: FetchBackend,
    /// WebDriver endpoint (chromedriver by default).
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    /// Upper bound on concurrent page fetches within one batch.
    pub max_concurrent_fetches: usize,
    pub selectors: EngineSelectors,
    pub timings: FetchTimings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine_url: "https://www.baidu.com/".to_string(),
            search_url: "https://www.baidu.com/s?wd={query}".to_string(),
            backend: FetchBackend::Browser,
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            stealth: StealthLevel::Balanced,
            max_concurrent_fetches: 8,
            selectors: EngineSelectors::default(),
            timings: FetchTimings::default(),
        }
    }
}

impl SearchSettings {
    /// Check the settings for contract violations that must halt startup.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("engine_url", &self.engine_url),
            ("webdriver_url", &self.webdriver_url),
        ] {
            Url::parse(value)
                .map_err(|e| ScoutError::Config(format!("{name} is not a valid URL ({value}): {e}")))?;
        }
        if !self.search_url.contains("{query}") {
            return Err(ScoutError::Config(
                "search_url must contain a {query} placeholder".to_string(),
            ));
        }
        Url::parse(&self.search_url.replace("{query}", "q"))
            .map_err(|e| ScoutError::Config(format!("search_url is not a valid URL: {e}")))?;
        if self.max_concurrent_fetches == 0 {
            return Err(ScoutError::Config(
                "max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        for (name, window) in [
            ("results_wait_ms", self.timings.results_wait_ms),
            ("next_page_wait_ms", self.timings.next_page_wait_ms),
        ] {
            if window.min > window.max {
                return Err(ScoutError::Config(format!(
                    "{name}: min ({}) exceeds max ({})",
                    window.min, window.max
                )));
            }
        }
        if self.timings.navigation_timeout_secs == 0 || self.timings.http_timeout_secs == 0 {
            return Err(ScoutError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Error types used across the Scout system.
#[derive(thiserror::Error, Debug)]
pub enum ScoutError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`ScoutError`].
pub type Result<T> = std::result::Result<T, ScoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SearchSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_wait_window() {
        let mut settings = SearchSettings::default();
        settings.timings.results_wait_ms = WaitWindow::new(10_000, 6_000);
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("results_wait_ms"));
    }

    #[test]
    fn rejects_relative_engine_url() {
        let settings = SearchSettings {
            engine_url: "/search".to_string(),
            ..SearchSettings::default()
        };
        assert!(matches!(settings.validate(), Err(ScoutError::Config(_))));
    }

    #[test]
    fn rejects_search_url_without_placeholder() {
        let settings = SearchSettings {
            search_url: "https://www.baidu.com/s".to_string(),
            ..SearchSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let settings = SearchSettings {
            max_concurrent_fetches: 0,
            ..SearchSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: SearchSettings =
            serde_json::from_str(r#"{ "backend": "http", "timings": { "http_retries": 5 } }"#)
                .unwrap();
        assert_eq!(settings.backend, FetchBackend::Http);
        assert_eq!(settings.timings.http_retries, 5);
        assert_eq!(settings.timings.navigation_timeout_secs, 30);
        assert_eq!(settings.selectors.results_container, "#content_left");
    }
}
