//! quill - character-consistent prose generation from the command line

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quill_core::{InMemoryCatalog, InMemoryMemoryStore, MemoryRepository, QuillConfig, SqliteMemoryStore};
use quill_llm::{LlmClient, LlmProvider};
use quill_pipeline::{CancelToken, Collaborators, GenerationPipeline, GenerationRequest, WorldFile};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Generate prose that stays true to its characters and world
#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Character- and world-consistent prose generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one generation request and print the result as JSON
    Generate {
        /// Path to quill.toml (defaults apply when omitted)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// JSON world file with projects, worldviews, characters and memories
        #[arg(long, short = 'w')]
        world: PathBuf,

        /// JSON generation request
        #[arg(long, short = 'r')]
        request: PathBuf,

        /// Emit logs as JSON lines
        #[arg(long)]
        json_logs: bool,

        /// Abort the whole run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
    },

    /// Validate and print the effective configuration
    CheckConfig {
        /// Path to quill.toml
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate {
            config,
            world,
            request,
            json_logs,
            deadline_secs,
        } => generate(config.as_deref(), &world, &request, json_logs, deadline_secs).await,
        Command::CheckConfig { config } => check_config(config.as_deref()),
    }
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    // stdout carries the result; logs go to stderr.
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<QuillConfig> {
    let config = match path {
        Some(p) => QuillConfig::from_file(p).with_context(|| format!("loading config {}", p.display()))?,
        None => QuillConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn check_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    LlmProvider::from_name(&config.llm.provider, &config.llm.base_url, config.llm.api_key.clone())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

async fn generate(
    config: Option<&Path>,
    world: &Path,
    request: &Path,
    json_logs: bool,
    deadline_secs: Option<u64>,
) -> Result<()> {
    let config = load_config(config)?;
    init_logging(&config.general.log_level, json_logs);

    let world = WorldFile::from_file(world).with_context(|| format!("loading world {}", world.display()))?;
    let request: GenerationRequest = serde_json::from_str(
        &std::fs::read_to_string(request).with_context(|| format!("reading request {}", request.display()))?,
    )
    .context("parsing request")?;

    let store: Arc<dyn MemoryRepository> = match &config.persistence.db_path {
        Some(path) => {
            info!(path = %path, "Opening SQLite memory store");
            Arc::new(SqliteMemoryStore::open(path, &config.persistence)?)
        }
        None => Arc::new(InMemoryMemoryStore::new()),
    };
    let catalog = Arc::new(InMemoryCatalog::new());
    world.install(&catalog, store.as_ref())?;

    let provider = LlmProvider::from_name(&config.llm.provider, &config.llm.base_url, config.llm.api_key.clone())?;
    let client = LlmClient::new(provider, &config.llm.model, config.llm.max_retries)
        .with_default_timeout(config.pipeline.generator_timeout_ms);
    if !client.is_available() {
        warn!(provider = %config.llm.provider, "No text generator configured; the run will fail at the first attempt");
    }

    let pipeline = GenerationPipeline::new(&config, Collaborators::from_catalog(catalog, store), Arc::new(client));

    let (handle, token) = CancelToken::pair();
    let token = match deadline_secs {
        Some(secs) => token.with_timeout(Duration::from_secs(secs)),
        None => token,
    };
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling generation");
            handle.cancel();
        }
    });

    let result = pipeline.execute_with(request, &token).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(2);
    }
    Ok(())
}
