/// Triple verification of an anchored execution.
///
/// Three hashes must line up for a record to count as verified:
/// the hash decoded from the on-chain `ReceiptStored` event, the hash
/// stored alongside the record, and a hash recomputed here from the
/// stored payload fields. The recomputed leg is skipped (not failed)
/// when the record predates payload storage and the fields are absent.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::{event, ChainGateway};
use crate::error::{Result, TrailError};
use crate::poa;
use crate::state::RecordStore;

/// Outcome of a verification request.
///
/// Always reports all three hashes so callers can see which leg
/// disagreed. `error` explains why verification could not complete;
/// a clean mismatch carries no error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub on_chain_hash: Option<String>,
    pub stored_hash: String,
    pub recomputed_hash: Option<String>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub contract_address: Option<String>,
    pub chain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Verify a record against the chain.
///
/// Returns `NotFound` only when the record itself does not exist.
/// Chain-side problems (unreachable node, unmined transaction) come
/// back as an unverified result with `error` set, so the endpoint can
/// always answer.
pub async fn verify_execution(
    store: &dyn RecordStore,
    gateway: &dyn ChainGateway,
    id: Uuid,
) -> Result<VerificationResult> {
    let record = store
        .get_execution(id)
        .await?
        .ok_or(TrailError::NotFound(id))?;

    let recomputed_hash = match (&record.poa_timestamp, &record.result_json) {
        (Some(timestamp), Some(result_json)) => Some(poa::poa_hash(
            &record.goal,
            &record.target_url,
            timestamp,
            Some(result_json),
        )?),
        _ => None,
    };

    let chain = gateway.chain_name().to_string();

    let Some(tx_hash) = record.tx_hash.clone() else {
        return Ok(VerificationResult {
            verified: false,
            on_chain_hash: None,
            stored_hash: record.poa_hash,
            recomputed_hash,
            tx_hash: None,
            block_number: None,
            contract_address: None,
            chain,
            error: Some("No transaction hash — blockchain anchor is still pending.".to_string()),
        });
    };

    let receipt = match gateway.fetch_receipt(&tx_hash).await {
        Ok(receipt) => receipt,
        Err(e) => {
            return Ok(VerificationResult {
                verified: false,
                on_chain_hash: None,
                stored_hash: record.poa_hash,
                recomputed_hash,
                tx_hash: Some(tx_hash),
                block_number: None,
                contract_address: None,
                chain,
                error: Some(e.to_string()),
            })
        }
    };

    let Some(receipt) = receipt else {
        return Ok(VerificationResult {
            verified: false,
            on_chain_hash: None,
            stored_hash: record.poa_hash,
            recomputed_hash,
            tx_hash: Some(tx_hash.clone()),
            block_number: None,
            contract_address: None,
            chain,
            error: Some(format!("transaction {tx_hash} is not yet mined")),
        });
    };

    let on_chain_hash =
        event::first_receipt_stored(&receipt, gateway.contract_address()).map(|ev| ev.poaHash);

    let chain_matches_stored = on_chain_hash.as_deref() == Some(record.poa_hash.as_str());
    let stored_matches_recomputed = recomputed_hash.as_deref().map(|r| r == record.poa_hash);
    let verified = chain_matches_stored && stored_matches_recomputed.unwrap_or(true);

    Ok(VerificationResult {
        verified,
        on_chain_hash,
        stored_hash: record.poa_hash,
        recomputed_hash,
        tx_hash: Some(tx_hash),
        block_number: receipt.block_number_u64(),
        contract_address: Some(gateway.contract_address().to_string()),
        chain,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::receipt_stored_log;
    use crate::chain::{MockGateway, TxReceipt};
    use crate::state::models::ExecutionRecord;
    use crate::state::{MemoryStore, NewExecution};
    use crate::worker::anchor_execution;
    use alloy::primitives::Address;
    use serde_json::json;
    use std::time::Duration;

    const HASH: &str = "77f4d050a566d4c1146454a2a24925b9f9777a89224b06451f4763e02e58fcc5";

    async fn seed(store: &MemoryStore, result_json: Option<serde_json::Value>) -> ExecutionRecord {
        store
            .insert_execution(NewExecution {
                org_id: Uuid::now_v7(),
                run_id: None,
                goal: "Extract price".to_string(),
                target_url: "https://example.com".to_string(),
                poa_timestamp: "2024-01-01T00:00:00Z".to_string(),
                result_json,
                poa_hash: HASH.to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_anchored_record_passes_triple_verification() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, Some(json!({"price": "63481.08"}))).await;

        anchor_execution(&store, &gateway, record.id, Duration::from_secs(30))
            .await
            .unwrap();

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(result.verified);
        assert_eq!(result.on_chain_hash.as_deref(), Some(HASH));
        assert_eq!(result.stored_hash, HASH);
        assert_eq!(result.recomputed_hash.as_deref(), Some(HASH));
        assert_eq!(result.block_number, Some(16));
        assert_eq!(
            result.contract_address.as_deref(),
            Some("0x1abE15Ed2a424781f0b8C2C484aa237061E2B443")
        );
        assert_eq!(result.chain, "Base Sepolia");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_tampered_result_fails_recompute_leg() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        // Stored payload no longer matches the stored hash.
        let record = seed(&store, Some(json!({"price": "63481.09"}))).await;

        anchor_execution(&store, &gateway, record.id, Duration::from_secs(30))
            .await
            .unwrap();

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(!result.verified);
        assert_eq!(result.on_chain_hash.as_deref(), Some(HASH));
        assert_ne!(result.recomputed_hash.as_deref(), Some(HASH));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_on_chain_mismatch_fails_verification() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, Some(json!({"price": "63481.08"}))).await;

        store.set_submitted(record.id, "0xfeed").await.unwrap();
        store.set_completed(record.id, "0xfeed").await.unwrap();
        gateway
            .insert_receipt(TxReceipt {
                transaction_hash: "0xfeed".to_string(),
                block_number: Some("0x20".to_string()),
                status: Some("0x1".to_string()),
                logs: vec![receipt_stored_log(
                    gateway.contract_address(),
                    Address::repeat_byte(0xaa),
                    "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                    1_700_000_000,
                )],
            })
            .await;

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(!result.verified);
        assert_eq!(
            result.on_chain_hash.as_deref(),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
        assert_eq!(result.recomputed_hash.as_deref(), Some(HASH));
        assert_eq!(result.block_number, Some(32));
    }

    #[tokio::test]
    async fn test_pending_record_is_unverified_with_message() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, Some(json!({"price": "63481.08"}))).await;

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(!result.verified);
        assert!(result.on_chain_hash.is_none());
        assert!(result.tx_hash.is_none());
        assert!(result.block_number.is_none());
        assert!(result.contract_address.is_none());
        assert_eq!(result.recomputed_hash.as_deref(), Some(HASH));
        assert_eq!(
            result.error.as_deref(),
            Some("No transaction hash — blockchain anchor is still pending.")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_error_instead_of_failing() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, Some(json!({"price": "63481.08"}))).await;

        anchor_execution(&store, &gateway, record.id, Duration::from_secs(30))
            .await
            .unwrap();
        gateway.fail_next_fetch("rpc node unreachable").await;

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(!result.verified);
        assert!(result.on_chain_hash.is_none());
        assert!(result.tx_hash.is_some());
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("rpc node unreachable"));
    }

    #[tokio::test]
    async fn test_unmined_transaction_reports_error() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, Some(json!({"price": "63481.08"}))).await;

        // Submitted but the gateway has no receipt for it yet.
        store.set_submitted(record.id, "0xdead").await.unwrap();

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(!result.verified);
        assert!(result.error.as_deref().unwrap().contains("not yet mined"));
    }

    #[tokio::test]
    async fn test_receipt_without_event_is_unverified_without_error() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, Some(json!({"price": "63481.08"}))).await;

        store.set_submitted(record.id, "0xbead").await.unwrap();
        store.set_completed(record.id, "0xbead").await.unwrap();
        gateway
            .insert_receipt(TxReceipt {
                transaction_hash: "0xbead".to_string(),
                block_number: Some("0x20".to_string()),
                status: Some("0x1".to_string()),
                logs: vec![],
            })
            .await;

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        assert!(!result.verified);
        assert!(result.on_chain_hash.is_none());
        assert!(result.error.is_none());
        assert_eq!(result.block_number, Some(32));
    }

    #[tokio::test]
    async fn test_recompute_skipped_when_payload_absent() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();
        let record = seed(&store, None).await;

        anchor_execution(&store, &gateway, record.id, Duration::from_secs(30))
            .await
            .unwrap();

        let result = verify_execution(&store, &gateway, record.id).await.unwrap();
        // Chain leg matches; the recompute leg is absent, not failed.
        assert!(result.verified);
        assert!(result.recomputed_hash.is_none());
    }

    #[tokio::test]
    async fn test_unknown_record_is_not_found() {
        let store = MemoryStore::new();
        let gateway = MockGateway::new();

        let err = verify_execution(&store, &gateway, Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, TrailError::NotFound(_)));
    }
}
