use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    /// `false` when the transaction reverted.
    pub success: bool,
    pub block_number: Option<u64>,
    /// Logs in emission order.
    pub logs: Vec<LogEntry>,
}
