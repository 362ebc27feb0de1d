use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pokellm_agent::{AgentConfig, Bot, DecisionEngine, InferencePool, Mode, OllamaBackend};
use pokellm_client::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "pokellm.toml";

#[derive(Parser, Debug)]
#[command(name = "pokellm")]
#[command(about = "Play Pokemon Showdown battles with a local language model")]
struct Args {
    /// TOML config file; `pokellm.toml` is used when present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Battle format to search for
    #[arg(long)]
    format: Option<String>,

    /// Number of battles to play before exiting
    #[arg(long)]
    battles: Option<u32>,

    /// Wait for challenges from this user instead of searching the ladder
    #[arg(long)]
    accept_from: Option<String>,

    /// Model name passed to the inference backend
    #[arg(long)]
    model: Option<String>,
}

fn load_config(args: &Args) -> anyhow::Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => AgentConfig::load(Path::new(DEFAULT_CONFIG))?,
        None => AgentConfig::from_env()?,
    };

    if let Some(format) = &args.format {
        config.showdown.format = format.clone();
    }
    if let Some(battles) = args.battles {
        config.showdown.battles = battles;
    }
    if let Some(from) = &args.accept_from {
        config.showdown.accept_from = Some(from.clone());
    }
    if let Some(model) = &args.model {
        config.inference.model = model.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let mode = match &config.showdown.accept_from {
        Some(from) => Mode::Accept { from: from.clone() },
        None => Mode::Ladder {
            format: config.showdown.format.clone(),
        },
    };
    info!(
        server = %config.showdown.server_url,
        model = %config.inference.model,
        battles = config.showdown.battles,
        ?mode,
        "Starting"
    );

    let backend = OllamaBackend::new(config.ollama()).context("Failed to build inference client")?;
    let pool = InferencePool::new(Arc::new(backend), config.inference.max_concurrent);
    let engine = DecisionEngine::new(pool, config.engine());

    let mut client = Client::connect(config.client())
        .await
        .with_context(|| format!("Failed to connect to {}", config.showdown.server_url))?;

    let mut bot = Bot::new(
        Arc::new(client.handle()),
        engine,
        config.battle(),
        mode,
        config.showdown.battles,
    );
    client.run(&mut bot).await.context("Client stopped")?;

    let outcomes = bot.finish().await;
    let won = outcomes.iter().filter(|o| o.won == Some(true)).count();
    info!(played = outcomes.len(), won, "Done");
    Ok(())
}
