//! Search pipelines over a [`PageFetcher`].
//!
//! - shallow (`delta`): keyword fetch → parse every results page → snippets
//! - deep (`full`): shallow's entries → fetch each linked page → extract
//! - single URL: fetch → extract
//!
//! None of these return errors; failures show up as fewer documents or as
//! sentinel content.

use std::collections::HashSet;
use std::sync::Arc;

use scout_common::SearchSettings;
use tracing::{debug, info, warn};
use url::Url;

use crate::extract::ContentExtractor;
use crate::fetch::{PageFetcher, fetch_all};
use crate::results::ResultSetParser;
use crate::types::{DocumentMetadata, ExtractedDocument, PARSER_CONTENT_ERROR, ResultEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    /// Return the engine's own snippets.
    Shallow,
    /// Visit every result link and extract its main content.
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Success,
    /// Nothing was found; not an error.
    Empty,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub documents: Vec<ExtractedDocument>,
}

impl SearchOutcome {
    pub fn status(&self) -> SearchStatus {
        if self.documents.is_empty() {
            SearchStatus::Empty
        } else {
            SearchStatus::Success
        }
    }

    pub fn into_documents(self) -> Vec<ExtractedDocument> {
        self.documents
    }
}

impl From<Vec<ExtractedDocument>> for SearchOutcome {
    fn from(documents: Vec<ExtractedDocument>) -> Self {
        Self { documents }
    }
}

/// Chains fetching, result parsing and extraction into the search modes.
#[derive(Clone)]
pub struct SearchOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    parser: ResultSetParser,
    extractor: ContentExtractor,
    max_concurrent_fetches: usize,
}

impl SearchOrchestrator {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: &SearchSettings) -> Self {
        Self {
            fetcher,
            parser: ResultSetParser::new(Url::parse(&settings.engine_url).ok()),
            extractor: ContentExtractor::new(),
            max_concurrent_fetches: settings.max_concurrent_fetches,
        }
    }

    /// Snippet documents for `query`, at most `num`.
    pub async fn delta_search(&self, query: &str, num: usize) -> SearchOutcome {
        self.search(query, num, SearchDepth::Shallow).await
    }

    /// Full-page documents for `query`, at most `num`.
    pub async fn full_search(&self, query: &str, num: usize) -> SearchOutcome {
        self.search(query, num, SearchDepth::Deep).await
    }

    pub async fn search(&self, query: &str, num: usize, depth: SearchDepth) -> SearchOutcome {
        if num == 0 {
            return SearchOutcome::default();
        }
        let entries = self.keyword_entries(query).await;
        let documents = match depth {
            SearchDepth::Shallow => entries
                .into_iter()
                .take(num)
                .map(ExtractedDocument::from)
                .collect(),
            SearchDepth::Deep => {
                let mut documents = self.visit_entries(&entries).await;
                documents.truncate(num);
                documents
            }
        };
        info!(
            target: "search",
            %query,
            num,
            ?depth,
            documents = documents.len(),
            "search.done"
        );
        SearchOutcome { documents }
    }

    /// Main content of a single page; always one document.
    pub async fn url_search(&self, url: &str) -> SearchOutcome {
        let fetch = self.fetcher.fetch_url(url).await;
        let document = if fetch.is_success() {
            self.extractor.extract_page(url, &fetch.html)
        } else {
            warn!(
                target: "search",
                %url,
                error = fetch.error.as_deref().unwrap_or("empty document"),
                "search.url.fetch_failed"
            );
            ExtractedDocument::new(PARSER_CONTENT_ERROR, DocumentMetadata::source(url))
        };
        info!(target: "search", %url, "search.url.done");
        SearchOutcome::from(vec![document])
    }

    /// Entries from every fetched results page, page order then card order.
    async fn keyword_entries(&self, query: &str) -> Vec<ResultEntry> {
        let fetch = self.fetcher.fetch_keyword(query).await;
        if !fetch.is_success() {
            warn!(
                target: "search",
                %query,
                error = fetch.error.as_deref().unwrap_or("empty results page"),
                "search.keyword.fetch_failed"
            );
            return Vec::new();
        }
        let entries: Vec<ResultEntry> = fetch
            .pages
            .iter()
            .filter(|page| !page.trim().is_empty())
            .flat_map(|page| self.parser.parse(page))
            .collect();
        debug!(
            target: "search",
            %query,
            pages = fetch.pages.len(),
            entries = entries.len(),
            "search.keyword.parsed"
        );
        entries
    }

    /// Fetch each distinct absolute result link and extract it, skipping
    /// pages that could not be fetched.
    async fn visit_entries(&self, entries: &[ResultEntry]) -> Vec<ExtractedDocument> {
        let candidates: Vec<DocumentMetadata> = entries
            .iter()
            .map(|e| DocumentMetadata::titled(e.title.clone(), e.link.clone()))
            .collect();

        let mut seen = HashSet::new();
        let urls: Vec<String> = entries
            .iter()
            .map(|e| e.link.as_str())
            .filter(|link| is_fetchable(link))
            .filter(|link| seen.insert(*link))
            .map(str::to_string)
            .collect();

        let fetched = fetch_all(self.fetcher.as_ref(), &urls, self.max_concurrent_fetches).await;
        let skipped = fetched.iter().filter(|f| !f.is_success()).count();
        if skipped > 0 {
            debug!(target: "search", skipped, "search.full.skipped_failed_fetches");
        }

        fetched
            .iter()
            .filter(|fetch| fetch.is_success())
            .map(|fetch| self.extractor.extract_document(fetch, &candidates))
            .collect()
    }
}

fn is_fetchable(link: &str) -> bool {
    Url::parse(link).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
