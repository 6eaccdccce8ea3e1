//! Binds the loaded configuration to a search pipeline and renders results
//! in the response envelope.

use std::sync::Arc;

use anyhow::Result;
use scout_config::ScoutConfig;
use scout_web::{ExtractedDocument, PageFetcher, SearchOrchestrator, SearchOutcome, SearchStatus, build_fetcher};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Delta { query: String, num: usize },
    Full { query: String, num: usize },
    Url { url: String },
}

/// `{ code, message, result }` as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub code: u16,
    pub message: &'static str,
    pub result: Vec<ExtractedDocument>,
}

impl From<SearchOutcome> for Envelope {
    fn from(outcome: SearchOutcome) -> Self {
        let (code, message) = match outcome.status() {
            SearchStatus::Success => (200, "success"),
            SearchStatus::Empty => (500, "error"),
        };
        Self {
            code,
            message,
            result: outcome.into_documents(),
        }
    }
}

pub struct Tether {
    orchestrator: SearchOrchestrator,
}

impl Tether {
    pub fn new(fetcher: Arc<dyn PageFetcher>, cfg: &ScoutConfig) -> Self {
        Self {
            orchestrator: SearchOrchestrator::new(fetcher, &cfg.search),
        }
    }

    /// Build the fetcher named by `search.backend` and wire it up.
    pub fn from_config(cfg: &ScoutConfig) -> Result<Self> {
        let fetcher = build_fetcher(&cfg.search)?;
        Ok(Self::new(fetcher, cfg))
    }

    pub async fn run(&self, command: Command) -> Envelope {
        let outcome = match &command {
            Command::Delta { query, num } => self.orchestrator.delta_search(query, *num).await,
            Command::Full { query, num } => self.orchestrator.full_search(query, *num).await,
            Command::Url { url } => self.orchestrator.url_search(url).await,
        };
        let envelope = Envelope::from(outcome);
        info!(
            target: "app",
            ?command,
            code = envelope.code,
            documents = envelope.result.len(),
            "app.command.done"
        );
        envelope
    }
}
