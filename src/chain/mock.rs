/// Deterministic in-memory gateway for tests.
///
/// Submissions are scripted: each call pops the next plan (defaulting to
/// success) so tests can drive rejection, revert, and never-mined paths
/// without a node. Mined receipts carry a real ABI-encoded
/// `ReceiptStored` log so the verification path decodes them exactly as
/// it would on-chain data.
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::event::AgentTrail;
use super::{ChainGateway, LogEntry, TxReceipt};
use crate::error::{Result, TrailError};

/// Behavior of the next `submit` call.
#[derive(Debug, Clone)]
pub enum SubmitPlan {
    Accept,
    Reject(String),
}

/// Behavior of the next `await_confirmation` call.
#[derive(Debug, Clone)]
pub enum ConfirmPlan {
    Mine,
    Revert,
    NeverMine,
}

pub struct MockGateway {
    chain_name: String,
    contract: String,
    agent: Address,
    submit_plan: Mutex<VecDeque<SubmitPlan>>,
    confirm_plan: Mutex<VecDeque<ConfirmPlan>>,
    /// poa_hash by tx_hash, for building the mined receipt later.
    pending: Mutex<HashMap<String, String>>,
    receipts: Mutex<HashMap<String, TxReceipt>>,
    fetch_error: Mutex<Option<String>>,
    submit_count: AtomicUsize,
    next_tx: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            chain_name: "Base Sepolia".to_string(),
            contract: "0x1abE15Ed2a424781f0b8C2C484aa237061E2B443".to_string(),
            agent: Address::repeat_byte(0xaa),
            submit_plan: Mutex::new(VecDeque::new()),
            confirm_plan: Mutex::new(VecDeque::new()),
            pending: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            fetch_error: Mutex::new(None),
            submit_count: AtomicUsize::new(0),
            next_tx: AtomicUsize::new(0),
        }
    }

    /// Queue a plan for an upcoming `submit` call.
    pub async fn plan_submit(&self, plan: SubmitPlan) {
        self.submit_plan.lock().await.push_back(plan);
    }

    /// Queue a plan for an upcoming `await_confirmation` call.
    pub async fn plan_confirm(&self, plan: ConfirmPlan) {
        self.confirm_plan.lock().await.push_back(plan);
    }

    /// Make the next `fetch_receipt` call fail with `msg`.
    pub async fn fail_next_fetch(&self, msg: &str) {
        *self.fetch_error.lock().await = Some(msg.to_string());
    }

    /// Install a receipt directly, bypassing the submit/confirm flow.
    pub async fn insert_receipt(&self, receipt: TxReceipt) {
        self.receipts
            .lock()
            .await
            .insert(receipt.transaction_hash.clone(), receipt);
    }

    /// Number of `submit` calls seen so far.
    pub fn submits(&self) -> usize {
        self.submit_count.load(Ordering::SeqCst)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn chain_name(&self) -> &str {
        &self.chain_name
    }

    fn contract_address(&self) -> &str {
        &self.contract
    }

    async fn submit(&self, poa_hash: &str) -> Result<String> {
        self.submit_count.fetch_add(1, Ordering::SeqCst);

        let plan = self
            .submit_plan
            .lock()
            .await
            .pop_front()
            .unwrap_or(SubmitPlan::Accept);

        match plan {
            SubmitPlan::Accept => {
                let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
                let tx_hash = format!("0x{n:064x}");
                self.pending
                    .lock()
                    .await
                    .insert(tx_hash.clone(), poa_hash.to_string());
                Ok(tx_hash)
            }
            SubmitPlan::Reject(msg) => Err(TrailError::AnchorSubmit(msg)),
        }
    }

    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<TxReceipt> {
        let plan = self
            .confirm_plan
            .lock()
            .await
            .pop_front()
            .unwrap_or(ConfirmPlan::Mine);

        match plan {
            ConfirmPlan::Mine => {
                let poa_hash = self
                    .pending
                    .lock()
                    .await
                    .remove(tx_hash)
                    .unwrap_or_default();
                let receipt = TxReceipt {
                    transaction_hash: tx_hash.to_string(),
                    block_number: Some("0x10".to_string()),
                    status: Some("0x1".to_string()),
                    logs: vec![receipt_stored_log(
                        &self.contract,
                        self.agent,
                        &poa_hash,
                        1_700_000_000,
                    )],
                };
                self.receipts
                    .lock()
                    .await
                    .insert(tx_hash.to_string(), receipt.clone());
                Ok(receipt)
            }
            ConfirmPlan::Revert => {
                let receipt = TxReceipt {
                    transaction_hash: tx_hash.to_string(),
                    block_number: Some("0x10".to_string()),
                    status: Some("0x0".to_string()),
                    logs: vec![],
                };
                self.receipts
                    .lock()
                    .await
                    .insert(tx_hash.to_string(), receipt);
                Err(TrailError::AnchorConfirm(format!(
                    "transaction {tx_hash} reverted on-chain"
                )))
            }
            ConfirmPlan::NeverMine => {
                tokio::time::sleep(timeout).await;
                Err(TrailError::AnchorConfirm(format!(
                    "transaction {tx_hash} not confirmed within {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    async fn fetch_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        if let Some(msg) = self.fetch_error.lock().await.take() {
            return Err(TrailError::VerificationFetch(msg));
        }
        Ok(self.receipts.lock().await.get(tx_hash).cloned())
    }
}

/// A receipt log entry carrying a real ABI-encoded `ReceiptStored` event.
pub fn receipt_stored_log(contract: &str, agent: Address, poa_hash: &str, timestamp: u64) -> LogEntry {
    let event = AgentTrail::ReceiptStored {
        agent,
        poaHash: poa_hash.to_string(),
        timestamp: U256::from(timestamp),
    };
    let log_data = event.encode_log_data();

    LogEntry {
        address: contract.to_string(),
        topics: log_data
            .topics()
            .iter()
            .map(|t| format!("0x{}", hex::encode(t)))
            .collect(),
        data: format!("0x{}", hex::encode(&log_data.data)),
    }
}
