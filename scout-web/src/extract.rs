//! Main-content extraction: boilerplate cleanup, readability scoring and
//! markdown flattening.
//!
//! Every public entry point here returns content; failures are folded into
//! the sentinel strings from [`crate::types`] so a batch can move past one
//! bad page.

use std::io::Cursor;
use std::sync::LazyLock;

use scraper::{Html, Node, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::types::{
    DocumentMetadata, ExtractedDocument, FetchResult, NOT_FOUND, PARSE_URL_CONTENT_ERROR,
    PARSER_CONTENT_ERROR,
};

/// Elements that never carry article content.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "nav", "header", "footer", "aside", "form",
    "template",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid page url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("page has no readable body")]
    EmptyBody,
    #[error("markdown conversion failed: {0}")]
    Markdown(String),
}

/// Output of [`ContentExtractor::cleanup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cleaned {
    pub title: String,
    /// `<body>` with chrome, scripts and comments removed.
    pub body_html: String,
    /// Absolute http(s) link targets, first occurrence order.
    pub links: Vec<String>,
    /// Absolute http(s) image sources, first occurrence order.
    pub images: Vec<String>,
}

struct PageSelectors {
    title: Selector,
    og_title: Selector,
    body: Selector,
    anchor: Selector,
    image: Selector,
}

static SELECTORS: LazyLock<Option<PageSelectors>> = LazyLock::new(|| {
    Some(PageSelectors {
        title: Selector::parse("title").ok()?,
        og_title: Selector::parse(r#"meta[property="og:title"]"#).ok()?,
        body: Selector::parse("body").ok()?,
        anchor: Selector::parse("a[href]").ok()?,
        image: Selector::parse("img[src]").ok()?,
    })
});

#[derive(Debug, Clone, Copy, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Strip boilerplate from `html` and harvest its title, links and images.
    ///
    /// Fails when `url` is not absolute or nothing readable is left.
    pub fn cleanup(&self, html: &str, url: &str) -> Result<Cleaned, ExtractError> {
        let base = Url::parse(url).map_err(|e| ExtractError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let sel = SELECTORS.as_ref().ok_or(ExtractError::EmptyBody)?;

        let mut document = Html::parse_document(html);

        let title = document
            .select(&sel.title)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| {
                document
                    .select(&sel.og_title)
                    .next()
                    .and_then(|m| m.value().attr("content"))
                    .map(|t| t.trim().to_string())
            })
            .unwrap_or_default();

        let chrome: Vec<_> = document
            .tree
            .nodes()
            .filter(|node| match node.value() {
                Node::Comment(_) => true,
                Node::Element(el) => STRIP_TAGS.contains(&el.name()),
                _ => false,
            })
            .map(|node| node.id())
            .collect();
        for id in chrome {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let body = document
            .select(&sel.body)
            .next()
            .ok_or(ExtractError::EmptyBody)?;
        if !body.text().any(|t| !t.trim().is_empty()) {
            return Err(ExtractError::EmptyBody);
        }

        // Detached nodes stay in the arena, so harvest from the body subtree only.
        let links = absolute_urls(&base, body.select(&sel.anchor).filter_map(|a| a.value().attr("href")));
        let images = absolute_urls(&base, body.select(&sel.image).filter_map(|i| i.value().attr("src")));

        debug!(
            target: "extract",
            %url,
            links = links.len(),
            images = images.len(),
            "extract.cleanup.done"
        );
        Ok(Cleaned {
            title,
            body_html: body.html(),
            links,
            images,
        })
    }

    /// Readability pass over a cleaned fragment; hands back the input when
    /// scoring fails or finds nothing.
    pub fn summarize(&self, html: &str, url: &Url) -> String {
        let mut cursor = Cursor::new(html.as_bytes());
        match readability::extractor::extract(&mut cursor, url) {
            Ok(product) if !product.content.trim().is_empty() => product.content,
            Ok(_) => html.to_string(),
            Err(e) => {
                debug!(target: "extract", %url, error = %e, "extract.readability.fallback");
                html.to_string()
            }
        }
    }

    /// Flatten an HTML fragment to markdown, collapsing blank-line runs.
    pub fn to_markdown(&self, fragment: &str) -> Result<String, ExtractError> {
        let markdown = htmd::convert(fragment).map_err(|e| ExtractError::Markdown(e.to_string()))?;
        Ok(tidy_markdown(&markdown))
    }

    /// Cleanup, summarize and flatten `html` fetched from `source_url`.
    ///
    /// Returns `(title, content)`; content is [`NOT_FOUND`] when cleanup
    /// fails and [`PARSE_URL_CONTENT_ERROR`] when flattening fails.
    pub fn extract_main(&self, html: &str, source_url: &str) -> (String, String) {
        let cleaned = match self.cleanup(html, source_url) {
            Ok(cleaned) => cleaned,
            Err(e) => {
                warn!(target: "extract", url = %source_url, error = %e, "extract.cleanup_failed");
                return (String::new(), NOT_FOUND.to_string());
            }
        };
        (cleaned.title.clone(), self.render(&cleaned, source_url))
    }

    /// Build the document for one page of a batch, taking metadata from the
    /// candidate whose `source` matches the fetched URL.
    pub fn extract_document(&self, fetch: &FetchResult, candidates: &[DocumentMetadata]) -> ExtractedDocument {
        let mut metadata = reconcile_metadata(&fetch.target, candidates);
        let (title, content) = self.extract_main(&fetch.html, &fetch.target);
        if metadata.title.as_deref().is_none_or(str::is_empty) && !title.is_empty() {
            metadata.title = Some(title);
        }
        ExtractedDocument::new(content, metadata)
    }

    /// Single-URL variant: a page that cleanup rejects becomes
    /// [`PARSER_CONTENT_ERROR`], and metadata carries only the source.
    pub fn extract_page(&self, url: &str, html: &str) -> ExtractedDocument {
        let metadata = DocumentMetadata::source(url);
        if html.trim().is_empty() {
            return ExtractedDocument::new(PARSER_CONTENT_ERROR, metadata);
        }
        match self.cleanup(html, url) {
            Ok(cleaned) => ExtractedDocument::new(self.render(&cleaned, url), metadata),
            Err(e) => {
                warn!(target: "extract", %url, error = %e, "extract.cleanup_failed");
                ExtractedDocument::new(PARSER_CONTENT_ERROR, metadata)
            }
        }
    }

    fn render(&self, cleaned: &Cleaned, source_url: &str) -> String {
        let article = match Url::parse(source_url) {
            Ok(url) => self.summarize(&cleaned.body_html, &url),
            Err(_) => cleaned.body_html.clone(),
        };
        match self.to_markdown(&article) {
            Ok(markdown) => markdown,
            Err(e) => {
                warn!(target: "extract", url = %source_url, error = %e, "extract.markdown_failed");
                PARSE_URL_CONTENT_ERROR.to_string()
            }
        }
    }
}

/// Last candidate whose `source` equals `source`, else an entry with an
/// empty title.
pub fn reconcile_metadata(source: &str, candidates: &[DocumentMetadata]) -> DocumentMetadata {
    candidates
        .iter()
        .rfind(|c| c.source == source)
        .cloned()
        .unwrap_or_else(|| DocumentMetadata::titled("", source))
}

fn absolute_urls<'a>(base: &Url, raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in raw {
        let Ok(url) = base.join(value.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        let url = url.to_string();
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

/// Trim trailing whitespace per line and keep at most one blank line in a row.
fn tidy_markdown(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut blank_run = 0usize;
    for line in markdown.lines().map(str::trim_end) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
