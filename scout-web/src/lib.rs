//! Web search and content acquisition.
//!
//! - Page fetchers, browser-driven or plain HTTP (`fetch`)
//! - Results-page parsing into ranked entries (`results`, `noise`)
//! - Main-content extraction to Markdown (`extract`)
//! - Shallow, deep and single-URL search pipelines (`search`)

pub mod extract;
pub mod fetch;
pub mod noise;
pub mod results;
pub mod search;
pub mod types;

pub use extract::ContentExtractor;
pub use fetch::{PageFetcher, build_fetcher, fetch_all};
pub use results::ResultSetParser;
pub use search::{SearchDepth, SearchOrchestrator, SearchOutcome, SearchStatus};
pub use types::{DocumentMetadata, ExtractedDocument, FetchResult, ResultEntry};
