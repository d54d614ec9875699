use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use agent_trail::chain::{ChainGateway, EvmGateway};
use agent_trail::config::{self, AppConfig};
use agent_trail::engine::{AutomationEngine, SseEngine};
use agent_trail::error::{Result, TrailError};
use agent_trail::poa;
use agent_trail::server::{self, AppState};
use agent_trail::state::{Database, RecordStore};
use agent_trail::worker::AnchorWorker;

#[derive(Parser)]
#[command(name = "agent-trail")]
#[command(about = "Proof-of-Action receipts for browser agents, anchored on-chain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Compute the PoA hash of a payload
    Hash {
        /// Read the payload from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => serve().await,
        Commands::Migrate => migrate().await,
        Commands::Hash { file } => hash(file).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "agent-trail exiting");
        std::process::exit(1);
    }
}

async fn serve() -> Result<()> {
    let config = AppConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let store: Arc<dyn RecordStore> = Arc::new(db);
    let gateway: Arc<dyn ChainGateway> = Arc::new(EvmGateway::new(config.chain.clone()));
    let engine: Arc<dyn AutomationEngine> = Arc::new(SseEngine::new(config.engine.clone()));

    let worker = AnchorWorker::spawn(store.clone(), gateway.clone(), config.worker.clone());
    worker.recover_pending().await?;

    let state = AppState {
        store,
        engine,
        gateway,
        worker,
    };

    server::serve(state, &config.bind_addr).await
}

async fn migrate() -> Result<()> {
    let db = Database::connect(&config::database_url()?).await?;
    db.migrate().await?;
    tracing::info!("Migrations applied");
    Ok(())
}

/// Payload accepted by the `hash` command. Same canonical rules as the
/// server path, so operators can reproduce any stored hash by hand.
#[derive(Debug, Deserialize)]
struct HashInput {
    goal: String,
    url: String,
    timestamp: String,
    result_json: Option<serde_json::Value>,
}

async fn hash(file: Option<PathBuf>) -> Result<()> {
    let raw = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let input: HashInput = serde_json::from_str(&raw)
        .map_err(|e| TrailError::Serialization(format!("invalid payload: {e}")))?;

    let digest = poa::poa_hash(
        &input.goal,
        &input.url,
        &input.timestamp,
        input.result_json.as_ref(),
    )?;
    println!("{digest}");

    Ok(())
}
