/// EVM JSON-RPC gateway for anchoring transactions.
///
/// Builds, signs, and broadcasts legacy transactions calling the
/// AgentTrail contract's `storeReceipt` function. Uses raw JSON-RPC for
/// maximum node compatibility; only signing and ABI encoding go through
/// alloy.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{event, ChainGateway, TxReceipt};
use crate::error::{Result, TrailError};

/// How often the confirmation loop polls for a receipt.
const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Configuration for the EVM gateway.
#[derive(Debug, Clone)]
pub struct EvmConfig {
    /// JSON-RPC endpoint (e.g., Alchemy, Infura, local node).
    pub rpc_url: String,
    /// Human-readable chain name, reported in verification results.
    pub chain_name: String,
    /// Chain ID (84532 for Base Sepolia).
    pub chain_id: u64,
    /// Address of the AgentTrail contract (0x-prefixed).
    pub contract_address: String,
    /// Private key of the agent wallet (hex). In production this would
    /// come from a KMS.
    pub private_key_hex: String,
}

/// Gateway implementation over raw JSON-RPC.
pub struct EvmGateway {
    config: EvmConfig,
    client: Client,
}

/// Simplified JSON-RPC response.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

impl EvmGateway {
    pub fn new(config: EvmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Send a JSON-RPC request, returning the error as a plain string so
    /// callers can attach the failure phase.
    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<T, String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp: JsonRpcResponse<T> = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("RPC transport error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("RPC response parse error: {e}"))?;

        if let Some(err) = resp.error {
            return Err(format!("RPC error: {}", err.message));
        }

        resp.result.ok_or_else(|| "Empty RPC response".to_string())
    }

    /// Fetch the receipt for a transaction. `eth_getTransactionReceipt`
    /// returns null while the transaction is pending, which is a valid
    /// answer rather than an error.
    async fn get_receipt(&self, tx_hash: &str) -> std::result::Result<Option<TxReceipt>, String> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_getTransactionReceipt",
            "params": [tx_hash],
            "id": 1
        });

        let resp: JsonRpcResponse<TxReceipt> = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("RPC transport error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("RPC response parse error: {e}"))?;

        if let Some(err) = resp.error {
            return Err(format!("RPC error: {}", err.message));
        }

        Ok(resp.result)
    }

    /// Build, sign, and broadcast the `storeReceipt` transaction.
    async fn send_anchor_tx(&self, poa_hash: &str) -> Result<String> {
        use alloy::consensus::SignableTransaction;
        use alloy::primitives::{Address, Bytes, U256};
        use alloy::signers::local::PrivateKeySigner;
        use alloy::signers::Signer;

        // Parse signing key and contract address
        let signer: PrivateKeySigner = self
            .config
            .private_key_hex
            .parse()
            .map_err(|e| TrailError::AnchorSubmit(format!("Invalid wallet private key: {e}")))?;
        let contract: Address = self
            .config
            .contract_address
            .parse()
            .map_err(|e| TrailError::AnchorSubmit(format!("Invalid contract address: {e}")))?;

        let from_address = signer.address();
        let calldata = event::store_receipt_calldata(poa_hash);
        let data_hex = format!("0x{}", hex::encode(&calldata));

        // Get nonce
        let nonce_hex: String = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([format!("{from_address:?}"), "pending"]),
            )
            .await
            .map_err(TrailError::AnchorSubmit)?;
        let nonce = u64::from_str_radix(nonce_hex.trim_start_matches("0x"), 16)
            .map_err(|e| TrailError::AnchorSubmit(format!("Invalid nonce: {e}")))?;

        // Get gas price
        let gas_price_hex: String = self
            .rpc_call("eth_gasPrice", serde_json::json!([]))
            .await
            .map_err(TrailError::AnchorSubmit)?;
        let gas_price = u128::from_str_radix(gas_price_hex.trim_start_matches("0x"), 16)
            .map_err(|e| TrailError::AnchorSubmit(format!("Invalid gas price: {e}")))?;

        // Estimate gas for the contract call, with 20% headroom
        let estimate_hex: String = self
            .rpc_call(
                "eth_estimateGas",
                serde_json::json!([{
                    "from": format!("{from_address:?}"),
                    "to": format!("{contract:?}"),
                    "data": data_hex,
                }]),
            )
            .await
            .map_err(TrailError::AnchorSubmit)?;
        let estimate = u64::from_str_radix(estimate_hex.trim_start_matches("0x"), 16)
            .map_err(|e| TrailError::AnchorSubmit(format!("Invalid gas estimate: {e}")))?;
        let gas_limit = estimate + estimate / 5;

        // Build legacy transaction calling storeReceipt(poaHash)
        let tx = alloy::consensus::TxLegacy {
            chain_id: Some(self.config.chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: alloy::primitives::TxKind::Call(contract),
            value: U256::ZERO,
            input: Bytes::from(calldata),
        };

        // Sign the transaction
        let sig_hash = tx.signature_hash();
        let sig = signer
            .sign_hash(&sig_hash)
            .await
            .map_err(|e| TrailError::AnchorSubmit(format!("Transaction signing failed: {e}")))?;

        // Create signed envelope
        let signed = alloy::consensus::TxEnvelope::Legacy(tx.into_signed(sig));

        // RLP-encode and broadcast
        let mut raw_tx = Vec::new();
        alloy::eips::eip2718::Encodable2718::encode_2718(&signed, &mut raw_tx);
        let raw_hex = format!("0x{}", hex::encode(&raw_tx));

        let tx_hash: String = self
            .rpc_call("eth_sendRawTransaction", serde_json::json!([raw_hex]))
            .await
            .map_err(TrailError::AnchorSubmit)?;

        Ok(tx_hash)
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    fn chain_name(&self) -> &str {
        &self.config.chain_name
    }

    fn contract_address(&self) -> &str {
        &self.config.contract_address
    }

    async fn submit(&self, poa_hash: &str) -> Result<String> {
        self.send_anchor_tx(poa_hash).await
    }

    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<TxReceipt> {
        let started = tokio::time::Instant::now();

        loop {
            match self.get_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status.as_deref() == Some("0x0") {
                        return Err(TrailError::AnchorConfirm(format!(
                            "transaction {tx_hash} reverted on-chain"
                        )));
                    }
                    return Ok(receipt);
                }
                Ok(None) => {}
                // Transient node trouble is retried until the deadline.
                Err(e) => {
                    warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed, retrying");
                }
            }

            if started.elapsed() >= timeout {
                return Err(TrailError::AnchorConfirm(format!(
                    "transaction {tx_hash} not confirmed within {}s",
                    timeout.as_secs()
                )));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn fetch_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        self.get_receipt(tx_hash)
            .await
            .map_err(TrailError::VerificationFetch)
    }
}
