//! Strategies for getting a mutating call onto the manager contract.

use alloy_primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::models::contract::{ContractCall, DispatchMode, DispatchOutcome};
use crate::repositories::traits::{ExecutionChain, MultisigProposer};

#[async_trait]
pub trait CallDispatcher: Send + Sync {
    fn mode(&self) -> DispatchMode;
    async fn dispatch(&self, call: ContractCall) -> Result<DispatchOutcome>;
}

/// Sends the call from the caller's own account.
pub struct DirectDispatcher {
    chain: Arc<dyn ExecutionChain>,
}

impl DirectDispatcher {
    pub fn new(chain: Arc<dyn ExecutionChain>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl CallDispatcher for DirectDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Direct
    }

    async fn dispatch(&self, call: ContractCall) -> Result<DispatchOutcome> {
        let tx_hash = self.chain.send_transaction(call).await?;
        Ok(DispatchOutcome::Executed { tx_hash })
    }
}

/// Wraps the call as a proposal to the owning multisig.
pub struct MultisigDispatcher {
    multisig: Address,
    proposer: Arc<dyn MultisigProposer>,
}

impl MultisigDispatcher {
    pub fn new(multisig: Address, proposer: Arc<dyn MultisigProposer>) -> Self {
        Self { multisig, proposer }
    }
}

#[async_trait]
impl CallDispatcher for MultisigDispatcher {
    fn mode(&self) -> DispatchMode {
        DispatchMode::Proposed
    }

    async fn dispatch(&self, call: ContractCall) -> Result<DispatchOutcome> {
        let function = call.function_name().to_string();
        let proposal_id = self.proposer.propose(self.multisig, call).await?;
        info!(multisig = %self.multisig, %function, %proposal_id, "call proposed to multisig");
        Ok(DispatchOutcome::Proposed { proposal_id })
    }
}
