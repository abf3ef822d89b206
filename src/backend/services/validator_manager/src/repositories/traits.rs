use alloy_primitives::{Address, Bytes, B256};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    contract::ContractCall,
    message::{FinalizationRequest, UnsignedMessage},
    pipeline::PipelineTransition,
    receipt::TransactionReceipt,
    validator::{NodeId, SubnetId, ValidationRecord},
};

/// EVM chain hosting the validator manager contract.
#[async_trait]
pub trait ExecutionChain: Send + Sync {
    async fn contract_owner(&self, contract: Address) -> Result<Address>;
    async fn is_multisig(&self, address: Address) -> Result<bool>;
    /// Zero when the node has never been registered on this manager.
    async fn node_validation_id(&self, manager: Address, node_id: NodeId) -> Result<B256>;
    async fn validator(&self, manager: Address, validation_id: B256) -> Result<Option<ValidationRecord>>;
    async fn send_transaction(&self, call: ContractCall) -> Result<B256>;
    /// Bounded wait; fails once polling is exhausted.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt>;
}

/// Service collecting a quorum signature over a warp message.
#[async_trait]
pub trait SignatureAggregator: Send + Sync {
    async fn aggregate(
        &self,
        message: UnsignedMessage,
        signing_subnet_id: SubnetId,
        quorum_percentage: u8,
    ) -> Result<Bytes>;
}

/// Chain that finalizes validator-set membership.
#[async_trait]
pub trait RootChain: Send + Sync {
    async fn submit(&self, request: FinalizationRequest) -> Result<String>;
    async fn total_stake_weight(&self, subnet_id: SubnetId) -> Result<u64>;
}

/// Multi-party approval surface for contract-owned managers.
#[async_trait]
pub trait MultisigProposer: Send + Sync {
    async fn propose(&self, multisig: Address, call: ContractCall) -> Result<String>;
}

#[async_trait]
pub trait PipelineJournal: Send + Sync {
    async fn record(&self, transition: PipelineTransition) -> Result<()>;
    async fn history(&self, operation_id: Uuid) -> Result<Vec<PipelineTransition>>;
    async fn operations(&self) -> Result<Vec<Uuid>>;
}
