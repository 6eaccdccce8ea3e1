//! Search-results page parsing.
//!
//! Result cards are `div[tpl]` elements under `#content_left`. The `tpl`
//! attribute names the card variant; only organic web results, knowledge
//! entities and polysemy panels become entries.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace, warn};
use url::Url;

use crate::noise::is_noise;
use crate::types::ResultEntry;

const ACCEPTED_TPLS: &[&str] = &["se_com_default", "sg_kg_entity_san", "bk_polysemy"];
const NEWS_REALTIME_TPL: &str = "news-realtime";

struct CardSelectors {
    card: Selector,
    heading: Selector,
    link: Selector,
}

static SELECTORS: LazyLock<Option<CardSelectors>> = LazyLock::new(|| {
    Some(CardSelectors {
        card: Selector::parse("#content_left div[tpl]").ok()?,
        heading: Selector::parse("h3").ok()?,
        link: Selector::parse("a").ok()?,
    })
});

/// Turns results-page HTML into ordered, deduplicated [`ResultEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct ResultSetParser {
    base: Option<Url>,
}

impl ResultSetParser {
    /// `base` resolves relative result links (usually the engine URL).
    pub fn new(base: Option<Url>) -> Self {
        Self { base }
    }

    /// Parse one results page.
    ///
    /// Entries keep document order; a later card with the same
    /// `(snippet, title, link)` as an earlier one is dropped. Blank input
    /// yields a single [`ResultEntry::parse_error`] entry.
    pub fn parse(&self, html: &str) -> Vec<ResultEntry> {
        if html.trim().is_empty() {
            warn!(target: "parse.results", "parse.results.blank_input");
            return vec![ResultEntry::parse_error()];
        }

        let Some(sel) = SELECTORS.as_ref() else {
            warn!(target: "parse.results", "parse.results.selectors_unavailable");
            return vec![ResultEntry::parse_error()];
        };

        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for card in document.select(&sel.card) {
            match card.value().attr("tpl") {
                Some(tpl) if ACCEPTED_TPLS.contains(&tpl) => {}
                Some(NEWS_REALTIME_TPL) => {
                    trace!(target: "parse.results", "parse.results.news_realtime_skipped");
                    continue;
                }
                _ => continue,
            }

            let Some(entry) = self.parse_card(sel, card) else {
                skipped += 1;
                continue;
            };
            if seen.insert(dedup_key(&entry)) {
                entries.push(entry);
            }
        }

        debug!(
            target: "parse.results",
            entries = entries.len(),
            skipped,
            "parse.results.done"
        );
        entries
    }

    fn parse_card(&self, sel: &CardSelectors, card: ElementRef<'_>) -> Option<ResultEntry> {
        let heading = card.select(&sel.heading).next()?;
        let anchor = heading.select(&sel.link).next()?;
        let href = anchor.value().attr("href")?;

        let block = heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div")?;

        let nodes: Vec<&str> = block
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
            .flat_map(|el| el.text())
            .collect();
        if nodes.is_empty() {
            return None;
        }

        let snippet: String = nodes
            .into_iter()
            .filter(|text| !is_noise(text) && !text.contains('\n'))
            .collect();

        Some(ResultEntry {
            title: anchor.text().collect(),
            link: self.resolve(href),
            snippet,
        })
    }

    fn resolve(&self, href: &str) -> String {
        if let Ok(abs) = Url::parse(href) {
            return abs.to_string();
        }
        match self.base.as_ref().map(|base| base.join(href)) {
            Some(Ok(joined)) => joined.to_string(),
            _ => href.to_string(),
        }
    }
}

/// Content address of an entry; fields are length-prefixed so that
/// shifting text between them changes the key.
fn dedup_key(entry: &ResultEntry) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for field in [&entry.snippet, &entry.title, &entry.link] {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(tpl: &str, title: &str, href: &str, block: &str) -> String {
        format!(
            r#"<div class="result c-container" tpl="{tpl}"><h3 class="t"><a href="{href}">{title}</a></h3><div class="c-abstract">{block}</div></div>"#
        )
    }

    fn results_page(cards: &[String]) -> String {
        format!(
            r#"<html><head><title>rust_百度搜索</title></head><body><div id="content_left">{}</div></body></html>"#,
            cards.concat()
        )
    }

    fn parser() -> ResultSetParser {
        ResultSetParser::new(Url::parse("https://www.baidu.com/").ok())
    }

    #[test]
    fn parses_cards_in_document_order() {
        let html = results_page(&[
            card("se_com_default", "Rust 官网", "https://www.rust-lang.org/", "<div>系统编程语言</div>"),
            card("sg_kg_entity_san", "Rust 百科", "https://baike.example/rust", "<div><span>一门</span><span>语言</span></div>"),
            card("bk_polysemy", "Rust 游戏", "https://game.example/", "<div>生存游戏</div>"),
        ]);
        let entries = parser().parse(&html);
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Rust 官网", "Rust 百科", "Rust 游戏"]);
        assert_eq!(entries[1].snippet, "一门语言");
        assert_eq!(entries[0].link, "https://www.rust-lang.org/");
    }

    #[test]
    fn title_concatenates_link_text_nodes_verbatim() {
        let html = results_page(&[card(
            "se_com_default",
            " Rust <em>官网</em> ",
            "https://www.rust-lang.org/",
            "<div>系统编程语言</div>",
        )]);
        let entries = parser().parse(&html);
        assert_eq!(entries[0].title, " Rust 官网 ");
    }

    #[test]
    fn drops_noise_and_multiline_text_nodes() {
        let html = results_page(&[card(
            "se_com_default",
            "视频",
            "https://v.example/1",
            "<div><span>Rust 教程</span><span>不再出现</span><span>: 播放 / 暂停</span>\n<span>第一集</span></div>",
        )]);
        let entries = parser().parse(&html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].snippet, "Rust 教程第一集");
        assert!(!entries[0].snippet.contains("不再出现"));
    }

    #[test]
    fn skips_cards_without_content_text() {
        let html = results_page(&[
            card("se_com_default", "empty", "https://a.example/", "<div></div>"),
            card("se_com_default", "no child div", "https://b.example/", "<span>loose</span>"),
            card("se_com_default", "kept", "https://c.example/", "<div>text</div>"),
        ]);
        let entries = parser().parse(&html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "kept");
    }

    #[test]
    fn skips_news_and_unknown_variants() {
        let html = results_page(&[
            card("news-realtime", "快讯", "https://news.example/", "<div>最新</div>"),
            card("short_video", "短视频", "https://sv.example/", "<div>clip</div>"),
            card("se_com_default", "web", "https://web.example/", "<div>page</div>"),
        ]);
        let entries = parser().parse(&html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "web");
    }

    #[test]
    fn later_duplicates_are_suppressed() {
        let dup = card("se_com_default", "same", "https://same.example/", "<div>same snippet</div>");
        let html = results_page(&[
            dup.clone(),
            card("se_com_default", "other", "https://other.example/", "<div>other</div>"),
            dup,
            card("se_com_default", "same", "https://same.example/", "<div>different snippet</div>"),
        ]);
        let entries = parser().parse(&html);
        let snippets: Vec<_> = entries.iter().map(|e| e.snippet.as_str()).collect();
        assert_eq!(snippets, ["same snippet", "other", "different snippet"]);
    }

    #[test]
    fn parsing_is_idempotent() {
        let html = results_page(&[
            card("se_com_default", "a", "https://a.example/", "<div>one</div>"),
            card("se_com_default", "a", "https://a.example/", "<div>one</div>"),
            card("bk_polysemy", "b", "https://b.example/", "<div>two</div>"),
        ]);
        let parser = parser();
        assert_eq!(parser.parse(&html), parser.parse(&html));
    }

    #[test]
    fn resolves_relative_links_against_base() {
        let html = results_page(&[card(
            "se_com_default",
            "redirect",
            "/link?url=abc",
            "<div>text</div>",
        )]);
        let entries = parser().parse(&html);
        assert_eq!(entries[0].link, "https://www.baidu.com/link?url=abc");

        let entries = ResultSetParser::new(None).parse(&html);
        assert_eq!(entries[0].link, "/link?url=abc");
    }

    #[test]
    fn blank_input_yields_sentinel() {
        let entries = parser().parse("   ");
        assert_eq!(entries, vec![ResultEntry::parse_error()]);
    }

    #[test]
    fn page_without_results_is_empty() {
        assert!(parser().parse("<html><body><p>验证码</p></body></html>").is_empty());
    }

    #[test]
    fn dedup_key_separates_fields() {
        let a = ResultEntry { title: "ab".into(), link: "c".into(), snippet: String::new() };
        let b = ResultEntry { title: "a".into(), link: "bc".into(), snippet: String::new() };
        assert_ne!(dedup_key(&a), dedup_key(&b));
    }
}
