#![allow(dead_code)]

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::SolEvent;
use anyhow::Result;
use async_trait::async_trait;
use mockall::mock;
use uuid::Uuid;

use validator_manager::{
    models::{
        contract::{abi, ContractCall, WARP_PRECOMPILE_ADDRESS},
        message::{FinalizationRequest, UnsignedMessage},
        pipeline::PipelineTransition,
        receipt::{LogEntry, TransactionReceipt},
        validator::{
            BlsPublicKey, NodeId, PChainOwner, ProofOfPossession, SubnetId, ValidationRecord,
            ValidatorDescriptor,
        },
    },
    repositories::traits::*,
    OrchestratorConfig,
};

mock! {
    pub Chain {}
    #[async_trait]
    impl ExecutionChain for Chain {
        async fn contract_owner(&self, contract: Address) -> Result<Address>;
        async fn is_multisig(&self, address: Address) -> Result<bool>;
        async fn node_validation_id(&self, manager: Address, node_id: NodeId) -> Result<B256>;
        async fn validator(&self, manager: Address, validation_id: B256) -> Result<Option<ValidationRecord>>;
        async fn send_transaction(&self, call: ContractCall) -> Result<B256>;
        async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt>;
    }
}

mock! {
    pub Aggregator {}
    #[async_trait]
    impl SignatureAggregator for Aggregator {
        async fn aggregate(
            &self,
            message: UnsignedMessage,
            signing_subnet_id: SubnetId,
            quorum_percentage: u8,
        ) -> Result<Bytes>;
    }
}

mock! {
    pub Root {}
    #[async_trait]
    impl RootChain for Root {
        async fn submit(&self, request: FinalizationRequest) -> Result<String>;
        async fn total_stake_weight(&self, subnet_id: SubnetId) -> Result<u64>;
    }
}

mock! {
    pub Proposer {}
    #[async_trait]
    impl MultisigProposer for Proposer {
        async fn propose(&self, multisig: Address, call: ContractCall) -> Result<String>;
    }
}

mock! {
    pub Journal {}
    #[async_trait]
    impl PipelineJournal for Journal {
        async fn record(&self, transition: PipelineTransition) -> Result<()>;
        async fn history(&self, operation_id: Uuid) -> Result<Vec<PipelineTransition>>;
        async fn operations(&self) -> Result<Vec<Uuid>>;
    }
}

pub const MANAGER: Address = Address::repeat_byte(0x11);
pub const CALLER: Address = Address::repeat_byte(0x22);

pub fn config() -> OrchestratorConfig {
    OrchestratorConfig::new(SubnetId("2bRCr6B4MiEfSjidDwxDpdCyviwnfUVqB2HGwhm947w9YYqb7r".to_string()))
}

pub fn descriptor(node: u8, weight: u64) -> ValidatorDescriptor {
    let owner = PChainOwner {
        threshold: 1,
        addresses: vec![Address::repeat_byte(0x33)],
    };
    ValidatorDescriptor {
        node_id: NodeId([node; 20]),
        bls_public_key: BlsPublicKey::from_hex(&"ab".repeat(48)).unwrap(),
        bls_proof_of_possession: ProofOfPossession::from_hex(&"cd".repeat(96)).unwrap(),
        weight,
        balance: 1_000_000_000,
        remaining_balance_owner: owner.clone(),
        deactivation_owner: owner,
    }
}

fn u64_word(v: u64) -> [u8; 32] {
    let mut w = [0u8; 32];
    w[24..].copy_from_slice(&v.to_be_bytes());
    w
}

pub fn warp_log(message: &[u8]) -> LogEntry {
    LogEntry {
        address: WARP_PRECOMPILE_ADDRESS,
        topics: vec![
            abi::SendWarpMessage::SIGNATURE_HASH,
            B256::left_padding_from(MANAGER.as_slice()),
            B256::repeat_byte(0x42),
        ],
        data: Bytes::copy_from_slice(message),
    }
}

pub fn registration_log(validation_id: B256, node: u8, weight: u64) -> LogEntry {
    let mut data = Vec::new();
    data.extend_from_slice(B256::repeat_byte(0x42).as_slice());
    data.extend_from_slice(&u64_word(1_900_000_000));
    data.extend_from_slice(&u64_word(weight));
    LogEntry {
        address: MANAGER,
        topics: vec![
            abi::InitiatedValidatorRegistration::SIGNATURE_HASH,
            validation_id,
            B256::right_padding_from(&[node; 20]),
        ],
        data: data.into(),
    }
}

pub fn removal_log(validation_id: B256, weight: u64, end_time: u64) -> LogEntry {
    let mut data = Vec::new();
    data.extend_from_slice(B256::repeat_byte(0x42).as_slice());
    data.extend_from_slice(&u64_word(weight));
    data.extend_from_slice(&u64_word(end_time));
    LogEntry {
        address: MANAGER,
        topics: vec![abi::InitiatedValidatorRemoval::SIGNATURE_HASH, validation_id],
        data: data.into(),
    }
}

pub fn weight_update_log(validation_id: B256, nonce: u64, weight: u64) -> LogEntry {
    let mut data = Vec::new();
    data.extend_from_slice(&u64_word(nonce));
    data.extend_from_slice(B256::repeat_byte(0x42).as_slice());
    data.extend_from_slice(&u64_word(weight));
    LogEntry {
        address: MANAGER,
        topics: vec![abi::InitiatedValidatorWeightUpdate::SIGNATURE_HASH, validation_id],
        data: data.into(),
    }
}

pub fn unrelated_log(byte: u8) -> LogEntry {
    LogEntry {
        address: Address::repeat_byte(byte),
        topics: vec![B256::repeat_byte(byte)],
        data: Bytes::from(vec![byte; 16]),
    }
}

pub fn receipt(tx_hash: B256, success: bool, logs: Vec<LogEntry>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: tx_hash,
        success,
        block_number: Some(42),
        logs,
    }
}
