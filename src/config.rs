/// Runtime configuration, read from the environment.
///
/// Required: `DATABASE_URL`, `TRAIL_RPC_URL`, `AGENT_WALLET_PRIVATE_KEY`,
/// `AGENT_ENGINE_URL`, `AGENT_ENGINE_API_KEY`. Everything else defaults
/// to the Base Sepolia deployment.
use std::time::Duration;

use crate::chain::EvmConfig;
use crate::engine::EngineConfig;
use crate::error::{Result, TrailError};
use crate::worker::WorkerOptions;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CHAIN_ID: u64 = 84532;
const DEFAULT_CHAIN_NAME: &str = "Base Sepolia";
const DEFAULT_CONTRACT_ADDRESS: &str = "0x1abE15Ed2a424781f0b8C2C484aa237061E2B443";

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub chain: EvmConfig,
    pub engine: EngineConfig,
    pub worker: WorkerOptions,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let chain = EvmConfig {
            rpc_url: require("TRAIL_RPC_URL")?,
            chain_name: optional("TRAIL_CHAIN_NAME")
                .unwrap_or_else(|| DEFAULT_CHAIN_NAME.to_string()),
            chain_id: parsed("TRAIL_CHAIN_ID", DEFAULT_CHAIN_ID)?,
            contract_address: optional("TRAIL_CONTRACT_ADDRESS")
                .unwrap_or_else(|| DEFAULT_CONTRACT_ADDRESS.to_string()),
            private_key_hex: require("AGENT_WALLET_PRIVATE_KEY")?,
        };

        let engine = EngineConfig {
            base_url: require("AGENT_ENGINE_URL")?,
            api_key: require("AGENT_ENGINE_API_KEY")?,
        };

        let worker = WorkerOptions {
            workers: parsed("TRAIL_ANCHOR_WORKERS", 2)?,
            queue_depth: parsed("TRAIL_QUEUE_DEPTH", 64)?,
            confirm_timeout: Duration::from_secs(parsed("TRAIL_CONFIRM_TIMEOUT_SECS", 180)?),
        };

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            bind_addr: optional("TRAIL_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            chain,
            engine,
            worker,
        })
    }
}

/// The database URL alone, for commands that only touch the database.
pub fn database_url() -> Result<String> {
    require("DATABASE_URL")
}

fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TrailError::Config(format!("{name} is not set")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| TrailError::Config(format!("{name} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}
