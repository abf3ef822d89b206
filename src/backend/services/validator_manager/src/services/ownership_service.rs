use alloy_primitives::Address;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::models::{ownership::OwnershipState, pipeline::PipelineStage};
use crate::repositories::traits::{ExecutionChain, MultisigProposer};
use crate::services::dispatcher::{CallDispatcher, DirectDispatcher, MultisigDispatcher};
use crate::utils::errors::{OrchestratorError, Result};

/// A caller's view of one validator manager: who owns it and how mutating
/// calls reach it. Passed explicitly into every coordinator operation.
#[derive(Clone)]
pub struct ManagerSession {
    manager: Address,
    caller: Address,
    ownership: OwnershipState,
    dispatcher: Option<Arc<dyn CallDispatcher>>,
}

impl ManagerSession {
    pub fn new(
        manager: Address,
        caller: Address,
        ownership: OwnershipState,
        dispatcher: Option<Arc<dyn CallDispatcher>>,
    ) -> Self {
        Self {
            manager,
            caller,
            ownership,
            dispatcher,
        }
    }

    /// Session whose ownership has not been read yet.
    pub fn unresolved(manager: Address, caller: Address) -> Self {
        Self::new(manager, caller, OwnershipState::Loading, None)
    }

    pub fn manager(&self) -> Address {
        self.manager
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub fn ownership(&self) -> &OwnershipState {
        &self.ownership
    }

    /// The dispatcher for mutating calls, or why none may be made.
    pub fn authorize(&self) -> Result<Arc<dyn CallDispatcher>> {
        match &self.ownership {
            OwnershipState::Loading => Err(OrchestratorError::OwnershipUnresolved),
            OwnershipState::OwnedByOtherAccount { owner } => {
                Err(OrchestratorError::Unauthorized(format!(
                    "validator manager {} is owned by {}, not by {}",
                    self.manager, owner, self.caller
                )))
            }
            OwnershipState::ContractOwned { multisig } => self.dispatcher.clone().ok_or_else(|| {
                OrchestratorError::Validation(format!(
                    "validator manager {} is owned by multisig {} but no proposal service is configured",
                    self.manager, multisig
                ))
            }),
            OwnershipState::OwnedByCaller => self.dispatcher.clone().ok_or_else(|| {
                OrchestratorError::Validation(format!(
                    "no dispatcher available for validator manager {}",
                    self.manager
                ))
            }),
        }
    }
}

impl fmt::Debug for ManagerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerSession")
            .field("manager", &self.manager)
            .field("caller", &self.caller)
            .field("ownership", &self.ownership)
            .field("mode", &self.dispatcher.as_ref().map(|d| d.mode()))
            .finish()
    }
}

/// Reads the manager's owner and picks the authorization path.
pub struct OwnershipResolver {
    chain: Arc<dyn ExecutionChain>,
    proposer: Option<Arc<dyn MultisigProposer>>,
}

impl OwnershipResolver {
    pub fn new(chain: Arc<dyn ExecutionChain>, proposer: Option<Arc<dyn MultisigProposer>>) -> Self {
        Self { chain, proposer }
    }

    pub async fn resolve(&self, manager: Address, caller: Address) -> Result<OwnershipState> {
        let owner = self
            .chain
            .contract_owner(manager)
            .await
            .map_err(|e| OrchestratorError::collaborator(PipelineStage::Validating, &e))?;

        let state = if owner == caller {
            OwnershipState::OwnedByCaller
        } else if self
            .chain
            .is_multisig(owner)
            .await
            .map_err(|e| OrchestratorError::collaborator(PipelineStage::Validating, &e))?
        {
            OwnershipState::ContractOwned { multisig: owner }
        } else {
            OwnershipState::OwnedByOtherAccount { owner }
        };

        info!(%manager, %owner, %caller, ownership = ?state, "resolved validator manager ownership");
        Ok(state)
    }

    /// Resolve ownership and select the dispatcher once for the session.
    pub async fn open_session(&self, manager: Address, caller: Address) -> Result<ManagerSession> {
        let ownership = self.resolve(manager, caller).await?;

        let dispatcher: Option<Arc<dyn CallDispatcher>> = match &ownership {
            OwnershipState::OwnedByCaller => Some(Arc::new(DirectDispatcher::new(self.chain.clone()))),
            OwnershipState::ContractOwned { multisig } => self
                .proposer
                .clone()
                .map(|p| Arc::new(MultisigDispatcher::new(*multisig, p)) as Arc<dyn CallDispatcher>),
            OwnershipState::Loading | OwnershipState::OwnedByOtherAccount { .. } => None,
        };

        Ok(ManagerSession::new(manager, caller, ownership, dispatcher))
    }
}
