/// Blockchain access for anchoring PoA hashes.
///
/// The chain module provides a narrow trait over the three operations
/// the rest of the system needs: submit an anchoring transaction, wait
/// for it to be mined, and fetch the receipt of a mined transaction.
///
/// The production implementation (`EvmGateway`) talks raw JSON-RPC to an
/// EVM node and signs legacy transactions locally. Tests use the
/// scriptable `MockGateway` instead; nothing outside this module depends
/// on a live chain.
pub mod ethereum;
pub mod event;
pub mod mock;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use ethereum::{EvmConfig, EvmGateway};
pub use mock::MockGateway;

/// Transaction receipt as returned by the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    /// Transaction hash (0x-prefixed).
    pub transaction_hash: String,
    /// Block number as a hex quantity (None while pending).
    pub block_number: Option<String>,
    /// Execution status: "0x1" success, "0x0" reverted.
    pub status: Option<String>,
    /// Logs emitted during execution.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// A single log entry from a transaction receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Address of the emitting contract (0x-prefixed).
    pub address: String,
    /// Event topics; topics[0] is the event signature hash.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed event data (0x-prefixed hex).
    pub data: String,
}

impl TxReceipt {
    /// Block number parsed to a decimal integer.
    pub fn block_number_u64(&self) -> Option<u64> {
        let hex_str = self.block_number.as_deref()?;
        u64::from_str_radix(hex_str.trim_start_matches("0x"), 16).ok()
    }
}

/// Trait for the chain a PoA hash is anchored to.
///
/// Implementations are injected wherever chain access is needed, so the
/// anchor worker and the verifier can run against a mock in tests.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Human-readable chain name (e.g., "Base Sepolia").
    fn chain_name(&self) -> &str;

    /// Address of the anchoring contract (0x-prefixed).
    fn contract_address(&self) -> &str;

    /// Submit a transaction committing to `poa_hash`.
    /// Returns the transaction hash as soon as the node accepts it.
    async fn submit(&self, poa_hash: &str) -> Result<String>;

    /// Poll until the transaction is mined or the timeout elapses.
    /// A mined-but-reverted transaction is a confirmation failure.
    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<TxReceipt>;

    /// Fetch the receipt for a transaction, None if not yet mined.
    async fn fetch_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>>;
}
