/// Typed interface to the AgentTrail anchoring contract.
///
/// The contract exposes a single write, `storeReceipt`, which emits a
/// `ReceiptStored` event carrying the hash. Submission encodes the call;
/// verification decodes the event back out of receipt logs.
use alloy::primitives::{LogData, B256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};

use super::{LogEntry, TxReceipt};

sol! {
    contract AgentTrail {
        function storeReceipt(string poaHash) external;

        event ReceiptStored(address indexed agent, string poaHash, uint256 timestamp);
    }
}

/// ABI-encoded calldata for `storeReceipt(poa_hash)`.
pub fn store_receipt_calldata(poa_hash: &str) -> Vec<u8> {
    AgentTrail::storeReceiptCall {
        poaHash: poa_hash.to_string(),
    }
    .abi_encode()
}

/// First `ReceiptStored` event emitted by `contract` in the receipt.
///
/// Receipts routinely carry unrelated logs from other contracts touched
/// in the same transaction, and future contract versions may add events.
/// Entries from a different address or that fail to decode are skipped;
/// the scan continues in log order and the first match wins.
pub fn first_receipt_stored(
    receipt: &TxReceipt,
    contract: &str,
) -> Option<AgentTrail::ReceiptStored> {
    receipt
        .logs
        .iter()
        .find_map(|log| decode_receipt_stored(log, contract))
}

fn decode_receipt_stored(log: &LogEntry, contract: &str) -> Option<AgentTrail::ReceiptStored> {
    if !log.address.eq_ignore_ascii_case(contract) {
        return None;
    }

    let topics: Vec<B256> = log
        .topics
        .iter()
        .map(|t| t.parse::<B256>().ok())
        .collect::<Option<Vec<_>>>()?;
    let data = hex::decode(log.data.trim_start_matches("0x")).ok()?;

    let log_data = LogData::new(topics, data.into())?;
    AgentTrail::ReceiptStored::decode_log_data(&log_data).ok()
}
