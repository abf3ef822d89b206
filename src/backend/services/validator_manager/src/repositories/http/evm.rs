use alloy_primitives::{Address, Bytes, B256, U256, U64};
use alloy_sol_types::SolCall;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::rpc::{http_client, JsonRpcClient};
use crate::models::{
    contract::{abi, ContractCall},
    receipt::{LogEntry, TransactionReceipt},
    validator::{NodeId, ValidationRecord, ValidationStatus},
};
use crate::repositories::traits::ExecutionChain;

/// How long to poll for a transaction receipt.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolling {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReceiptPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    block_number: Option<U64>,
    logs: Vec<RpcLog>,
}

impl From<RpcReceipt> for TransactionReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        TransactionReceipt {
            transaction_hash: receipt.transaction_hash,
            success: receipt.status.map(|s| s == U64::from(1)).unwrap_or(false),
            block_number: receipt.block_number.map(|n| n.to::<u64>()),
            logs: receipt
                .logs
                .into_iter()
                .map(|log| LogEntry {
                    address: log.address,
                    topics: log.topics,
                    data: log.data,
                })
                .collect(),
        }
    }
}

/// JSON-RPC client for the execution chain. Transactions are sent with
/// `eth_sendTransaction` from `sender`, so the node signs for it.
pub struct EvmRpcClient {
    rpc: JsonRpcClient,
    sender: Address,
    polling: ReceiptPolling,
}

impl EvmRpcClient {
    /// `request_timeout` bounds every single RPC request, so a stalled node
    /// cannot hold up receipt polling.
    pub fn new(
        url: impl Into<String>,
        sender: Address,
        polling: ReceiptPolling,
        request_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            rpc: JsonRpcClient::new(http_client(request_timeout)?, url),
            sender,
            polling,
        })
    }

    async fn call_view<C: SolCall>(&self, target: Address, call: &C) -> Result<C::Return> {
        let data: Bytes = call.abi_encode().into();
        let output: Bytes = self
            .rpc
            .call("eth_call", json!([{ "to": target, "data": data }, "latest"]))
            .await
            .with_context(|| format!("eth_call {} on {}", C::SIGNATURE, target))?;
        C::abi_decode_returns(&output, true)
            .with_context(|| format!("decoding {} output", C::SIGNATURE))
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let receipt: Option<RpcReceipt> = self
            .rpc
            .call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        Ok(receipt.map(Into::into))
    }
}

#[async_trait]
impl ExecutionChain for EvmRpcClient {
    async fn contract_owner(&self, contract: Address) -> Result<Address> {
        Ok(self.call_view(contract, &abi::ownerCall {}).await?._0)
    }

    async fn is_multisig(&self, address: Address) -> Result<bool> {
        let code: Bytes = self
            .rpc
            .call("eth_getCode", json!([address, "latest"]))
            .await?;
        if code.is_empty() {
            return Ok(false);
        }

        match self.call_view(address, &abi::getThresholdCall {}).await {
            Ok(ret) => Ok(ret._0 > U256::ZERO),
            Err(e) => {
                debug!(%address, error = %e, "contract owner does not expose a signer threshold");
                Ok(false)
            }
        }
    }

    async fn node_validation_id(&self, manager: Address, node_id: NodeId) -> Result<B256> {
        let call = abi::getNodeValidationIDCall {
            nodeID: Bytes::copy_from_slice(node_id.as_bytes()),
        };
        Ok(self.call_view(manager, &call).await?._0)
    }

    async fn validator(&self, manager: Address, validation_id: B256) -> Result<Option<ValidationRecord>> {
        let call = abi::getValidatorCall {
            validationID: validation_id,
        };
        let validator = self.call_view(manager, &call).await?._0;

        Ok(ValidationStatus::from_contract(validator.status).map(|status| ValidationRecord {
            validation_id,
            weight: validator.weight,
            end_time: validator.endTime,
            status,
        }))
    }

    async fn send_transaction(&self, call: ContractCall) -> Result<B256> {
        debug!(to = %call.target, function = %call.function, "sending transaction");
        self.rpc
            .call(
                "eth_sendTransaction",
                json!([{ "from": self.sender, "to": call.target, "data": call.calldata }]),
            )
            .await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        for attempt in 1..=self.polling.max_attempts {
            match self.receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => debug!(%tx_hash, attempt, "receipt not available yet"),
                Err(e) => warn!(%tx_hash, attempt, error = %e, "receipt lookup failed"),
            }
            tokio::time::sleep(self.polling.interval).await;
        }

        bail!(
            "timed out waiting for receipt of {} after {} attempts",
            tx_hash,
            self.polling.max_attempts
        )
    }
}
