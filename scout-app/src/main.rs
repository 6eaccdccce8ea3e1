use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scout_common::observability::init_logging;
use scout_config::{ScoutConfig, ScoutConfigLoader};
use tether::{Command, Tether};
use tracing::info;
mod tether;

const DEFAULT_CONFIG: &str = "scout.yaml";

/// Web search and page extraction from the command line.
#[derive(Debug, Parser)]
#[command(name = "scout", version, about)]
struct Cli {
    /// Configuration file; `scout.yaml` in the working directory when omitted.
    #[arg(long, short, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Result snippets straight from the engine.
    Delta {
        query: String,
        #[arg(long, short, default_value_t = 10)]
        num: usize,
    },
    /// Main content of every result page.
    Full {
        query: String,
        #[arg(long, short, default_value_t = 10)]
        num: usize,
    },
    /// Main content of a single page.
    Url { url: String },
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Delta { query, num } => Command::Delta { query, num },
            CliCommand::Full { query, num } => Command::Full { query, num },
            CliCommand::Url { url } => Command::Url { url },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins); an explicit path must exist
    let loader = match &cli.config {
        Some(path) => ScoutConfigLoader::new().with_file(path),
        None => ScoutConfigLoader::new().with_optional_file(DEFAULT_CONFIG),
    };
    let cfg: ScoutConfig = loader.load()?;

    let log_path = init_logging(cfg.log.to_log_config("scout"))?;
    info!(
        target: "app",
        log = %log_path.display(),
        backend = %cfg.search.backend,
        engine = %cfg.search.engine_url,
        "app.started"
    );

    let tether = Tether::from_config(&cfg)?;
    let envelope = tether.run(cli.command.into()).await;

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
