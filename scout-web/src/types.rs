//! Pipeline data model.
//!
//! [`FetchResult`] and [`ResultEntry`] live only for the duration of one
//! search call; [`ExtractedDocument`] is what callers get back.

use serde::{Deserialize, Serialize};

/// Extraction could not find a usable main-content region.
pub const NOT_FOUND: &str = "not found";
/// The readability or markdown step failed on a fetched page.
pub const PARSE_URL_CONTENT_ERROR: &str = "parse url content error!";
/// A single-URL fetch produced no HTML, or cleanup rejected it.
pub const PARSER_CONTENT_ERROR: &str = "parser content error!";
/// A results page could not be parsed at all.
pub const PARSE_KEYWORD_HTML_ERROR: &str = "parse keyword html error!";

/// Raw HTML for one URL or keyword, or the reason it could not be fetched.
///
/// Keyword fetches carry one or two result pages in `pages`; URL fetches
/// carry their single document in both `html` and `pages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub target: String,
    pub html: String,
    pub pages: Vec<String>,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn page(target: impl Into<String>, html: String) -> Self {
        Self {
            target: target.into(),
            pages: vec![html.clone()],
            html,
            error: None,
        }
    }

    /// Keyword result; `html` mirrors the first page.
    pub fn pages(target: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            target: target.into(),
            html: pages.first().cloned().unwrap_or_default(),
            pages,
            error: None,
        }
    }

    pub fn failed(target: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            html: String::new(),
            pages: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.html.trim().is_empty()
    }
}

/// One organic result parsed from a results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

impl ResultEntry {
    /// Stand-in entry emitted when a results page cannot be parsed.
    pub fn parse_error() -> Self {
        Self {
            title: String::new(),
            link: String::new(),
            snippet: PARSE_KEYWORD_HTML_ERROR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub source: String,
}

impl DocumentMetadata {
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            title: None,
            source: source.into(),
        }
    }

    pub fn titled(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            source: source.into(),
        }
    }
}

/// A normalized document returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl ExtractedDocument {
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

impl From<ResultEntry> for ExtractedDocument {
    fn from(entry: ResultEntry) -> Self {
        Self {
            content: entry.snippet,
            metadata: DocumentMetadata::titled(entry.title, entry.link),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_fetch_is_not_success() {
        let failed = FetchResult::failed("https://example.com", "timeout");
        assert!(!failed.is_success());
        assert!(failed.html.is_empty());
        assert!(failed.pages.is_empty());
    }

    #[test]
    fn blank_page_is_not_success() {
        assert!(!FetchResult::page("https://example.com", "  \n".to_string()).is_success());
        assert!(FetchResult::page("https://example.com", "<p>x</p>".to_string()).is_success());
    }

    #[test]
    fn metadata_omits_missing_title() {
        let doc = ExtractedDocument::new("body", DocumentMetadata::source("https://a.example/"));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "content": "body", "metadata": { "source": "https://a.example/" } })
        );
    }

    #[test]
    fn entry_becomes_snippet_document() {
        let doc: ExtractedDocument = ResultEntry {
            title: "Rust".into(),
            link: "https://www.rust-lang.org/".into(),
            snippet: "A language".into(),
        }
        .into();
        assert_eq!(doc.content, "A language");
        assert_eq!(doc.metadata.title.as_deref(), Some("Rust"));
        assert_eq!(doc.metadata.source, "https://www.rust-lang.org/");
    }
}
