use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::OrchestratorConfig;
use crate::models::{
    contract::{ContractCall, DispatchMode},
    message::{Finalization, FinalizationRequest, UnsignedMessage},
    pipeline::{Pipeline, PipelineKind, PipelineStage, PipelineState},
    receipt::TransactionReceipt,
    validator::{NodeId, ProofOfPossession, SubnetId, ValidatorDescriptor},
};
use crate::repositories::traits::{ExecutionChain, PipelineJournal, RootChain, SignatureAggregator};
use crate::services::completion::{fetch_receipt, sign_and_finalize};
use crate::services::dispatcher::CallDispatcher;
use crate::services::enforce_stake_cap;
use crate::services::finalization_service::FinalizationService;
use crate::services::message_extractor::extract_unsigned_message;
use crate::services::ownership_service::ManagerSession;
use crate::services::signature_aggregation_service::SignatureAggregationService;
use crate::services::submission::{submit_primary, submit_resend, Submission};
use crate::services::tracking::PipelineRecorder;
use crate::utils::errors::{ExecutionError, OrchestratorError, Result};

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub validators: Vec<ValidatorDescriptor>,
    /// Current total L1 stake weight, 0 when unknown.
    pub total_stake: u64,
}

/// An executed registration, ready for signature aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub operation_id: uuid::Uuid,
    pub tx_hash: B256,
    pub node_id: NodeId,
    pub validation_id: B256,
    pub weight: u64,
    pub unsigned_message: UnsignedMessage,
    pub balance: u64,
    pub bls_proof_of_possession: ProofOfPossession,
    /// Completed by re-announcing an existing validation.
    pub resent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum RegistrationOutcome {
    Executed(RegistrationResult),
    /// Pending co-signature on the owning multisig. No validation id or
    /// message exists yet.
    Proposed {
        operation_id: uuid::Uuid,
        node_id: NodeId,
        proposal_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct CompleteRegistrationRequest {
    pub tx_hash: B256,
    pub balance: u64,
    pub proof_of_possession: ProofOfPossession,
    pub signing_subnet_id: Option<SubnetId>,
    pub quorum_percentage: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRegistration {
    pub operation_id: uuid::Uuid,
    pub validation_id: Option<B256>,
    pub finalization: Finalization,
}

/// Announces new validators on the manager contract and, as a separate
/// step, finalizes them on the root chain.
pub struct RegistrationService {
    chain: Arc<dyn ExecutionChain>,
    aggregation: SignatureAggregationService,
    finalization: FinalizationService,
    recorder: PipelineRecorder,
    config: OrchestratorConfig,
}

impl RegistrationService {
    pub fn new(
        chain: Arc<dyn ExecutionChain>,
        aggregator: Arc<dyn SignatureAggregator>,
        root_chain: Arc<dyn RootChain>,
        journal: Arc<dyn PipelineJournal>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            chain,
            aggregation: SignatureAggregationService::new(aggregator),
            finalization: FinalizationService::new(root_chain),
            recorder: PipelineRecorder::new(journal),
            config,
        }
    }

    /// Checks run before any network call. Returns the session's dispatcher.
    pub fn preflight(
        &self,
        session: &ManagerSession,
        request: &RegistrationRequest,
    ) -> Result<Arc<dyn CallDispatcher>> {
        if request.validators.is_empty() {
            return Err(OrchestratorError::Validation(
                "at least one validator is required".to_string(),
            ));
        }
        let dispatcher = session.authorize()?;

        let mut seen = HashSet::new();
        for validator in &request.validators {
            if !seen.insert(validator.node_id) {
                return Err(OrchestratorError::Validation(format!(
                    "node {} is listed more than once",
                    validator.node_id
                )));
            }
            if validator.weight == 0 {
                return Err(OrchestratorError::Validation(format!(
                    "weight of node {} must be greater than zero",
                    validator.node_id
                )));
            }
            validator
                .remaining_balance_owner
                .validate()
                .map_err(|e| OrchestratorError::Validation(format!("remaining balance owner: {}", e)))?;
            validator
                .deactivation_owner
                .validate()
                .map_err(|e| OrchestratorError::Validation(format!("deactivation owner: {}", e)))?;
            enforce_stake_cap(&self.config, validator.weight, 0, request.total_stake)?;
        }

        Ok(dispatcher)
    }

    /// Register each validator in turn, stopping at the first failure. If
    /// earlier validators already went through, the failure comes back as
    /// [`OrchestratorError::BatchInterrupted`] carrying their outcomes.
    pub async fn register(
        &self,
        session: &ManagerSession,
        request: RegistrationRequest,
    ) -> Result<Vec<RegistrationOutcome>> {
        let dispatcher = self.preflight(session, &request)?;

        let mut outcomes = Vec::with_capacity(request.validators.len());
        for validator in &request.validators {
            let mut pipeline = Pipeline::new(PipelineKind::Registration);
            let result = self
                .register_one(&mut pipeline, session, dispatcher.as_ref(), validator)
                .await;
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(node_id = %validator.node_id, error = %e, "validator registration failed");
                    self.recorder.fail(&mut pipeline, &e).await;
                    if outcomes.is_empty() {
                        return Err(e);
                    }
                    return Err(OrchestratorError::BatchInterrupted {
                        node_id: validator.node_id.to_string(),
                        completed: outcomes,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(outcomes)
    }

    async fn register_one(
        &self,
        pipeline: &mut Pipeline,
        session: &ManagerSession,
        dispatcher: &dyn CallDispatcher,
        validator: &ValidatorDescriptor,
    ) -> Result<RegistrationOutcome> {
        let recorder = &self.recorder;
        recorder.advance(pipeline, PipelineState::Validating).await?;
        recorder
            .advance(pipeline, PipelineState::Submitting { mode: dispatcher.mode() })
            .await?;

        let call = ContractCall::initiate_registration(session.manager(), validator);
        let (receipt, known_id, resent) =
            match submit_primary(recorder, pipeline, self.chain.as_ref(), dispatcher, call).await? {
                Submission::Proposed { proposal_id } => {
                    recorder
                        .advance(pipeline, PipelineState::Proposed { proposal_id: proposal_id.clone() })
                        .await?;
                    return Ok(RegistrationOutcome::Proposed {
                        operation_id: pipeline.operation_id(),
                        node_id: validator.node_id,
                        proposal_id,
                    });
                }
                Submission::Confirmed(receipt) => (receipt, None, false),
                Submission::Reverted { reason } if dispatcher.mode() == DispatchMode::Direct => {
                    let (receipt, validation_id) = self.resend(pipeline, session, validator, reason).await?;
                    (receipt, Some(validation_id), true)
                }
                Submission::Reverted { reason } => {
                    return Err(OrchestratorError::Execution {
                        stage: PipelineStage::Submitting,
                        error: ExecutionError::Reverted(reason),
                    });
                }
            };

        let extracted = extract_unsigned_message(&receipt)?;
        let validation_id = match extracted.validation_id.or(known_id) {
            Some(id) => id,
            None => self.lookup_validation_id(&receipt, session, validator).await?,
        };
        recorder
            .advance(pipeline, PipelineState::Extracted { validation_id: Some(validation_id) })
            .await?;
        recorder.advance(pipeline, PipelineState::Succeeded).await?;

        info!(
            node_id = %validator.node_id,
            %validation_id,
            tx_hash = %receipt.transaction_hash,
            resent,
            "validator registration initiated"
        );
        Ok(RegistrationOutcome::Executed(RegistrationResult {
            operation_id: pipeline.operation_id(),
            tx_hash: receipt.transaction_hash,
            node_id: validator.node_id,
            validation_id,
            weight: extracted.weight.unwrap_or(validator.weight),
            unsigned_message: extracted.unsigned_message,
            balance: validator.balance,
            bls_proof_of_possession: validator.bls_proof_of_possession.clone(),
            resent,
        }))
    }

    /// The primary call reverted. If the manager already holds a validation
    /// for this node, re-announce it; otherwise the revert is final.
    async fn resend(
        &self,
        pipeline: &mut Pipeline,
        session: &ManagerSession,
        validator: &ValidatorDescriptor,
        primary: String,
    ) -> Result<(TransactionReceipt, B256)> {
        self.recorder
            .advance(pipeline, PipelineState::Fallback { reason: primary.clone() })
            .await?;

        let validation_id = self
            .chain
            .node_validation_id(session.manager(), validator.node_id)
            .await
            .map_err(|e| OrchestratorError::FallbackFailed {
                primary: primary.clone(),
                fallback: format!("validation lookup failed: {:#}", e),
            })?;
        if validation_id == B256::ZERO {
            warn!(node_id = %validator.node_id, "registration reverted and no validation exists");
            return Err(OrchestratorError::NoExistingValidation {
                node_id: validator.node_id.to_string(),
                primary,
            });
        }

        info!(node_id = %validator.node_id, %validation_id, "validation exists, resending registration message");
        let call = ContractCall::resend_registration(session.manager(), validation_id);
        let receipt = submit_resend(&self.recorder, pipeline, self.chain.as_ref(), call, &primary).await?;
        Ok((receipt, validation_id))
    }

    async fn lookup_validation_id(
        &self,
        receipt: &TransactionReceipt,
        session: &ManagerSession,
        validator: &ValidatorDescriptor,
    ) -> Result<B256> {
        let id = self
            .chain
            .node_validation_id(session.manager(), validator.node_id)
            .await
            .map_err(|e| OrchestratorError::collaborator(PipelineStage::Extracting, &e))?;
        if id == B256::ZERO {
            return Err(OrchestratorError::Decode {
                tx_hash: receipt.transaction_hash,
                reason: format!("no validation id found for node {}", validator.node_id),
            });
        }
        Ok(id)
    }

    /// Aggregate signatures over a registration message and register the
    /// validator on the root chain.
    pub async fn complete_registration(
        &self,
        request: CompleteRegistrationRequest,
    ) -> Result<CompletedRegistration> {
        let mut pipeline = Pipeline::new(PipelineKind::RegistrationCompletion);
        let result = self.complete_registration_inner(&mut pipeline, request).await;
        if let Err(e) = &result {
            error!(operation_id = %pipeline.operation_id(), error = %e, "registration completion failed");
            self.recorder.fail(&mut pipeline, e).await;
        }
        result
    }

    async fn complete_registration_inner(
        &self,
        pipeline: &mut Pipeline,
        request: CompleteRegistrationRequest,
    ) -> Result<CompletedRegistration> {
        let recorder = &self.recorder;
        recorder.advance(pipeline, PipelineState::Validating).await?;
        if request.proof_of_possession.as_bytes().is_empty() {
            return Err(OrchestratorError::Validation(
                "proof of possession is required to register on the root chain".to_string(),
            ));
        }

        let receipt = fetch_receipt(recorder, pipeline, self.chain.as_ref(), request.tx_hash).await?;
        let extracted = extract_unsigned_message(&receipt)?;
        recorder
            .advance(pipeline, PipelineState::Extracted { validation_id: extracted.validation_id })
            .await?;

        let signing_subnet = request
            .signing_subnet_id
            .unwrap_or_else(|| self.config.signing_subnet());
        let quorum = request.quorum_percentage.unwrap_or(self.config.quorum_percentage);
        let balance = request.balance;
        let proof_of_possession = request.proof_of_possession;

        let (_, finalization) = sign_and_finalize(
            recorder,
            pipeline,
            &self.aggregation,
            &self.finalization,
            &extracted.unsigned_message,
            &signing_subnet,
            quorum,
            |signed| FinalizationRequest::RegisterValidator {
                signed,
                balance,
                proof_of_possession,
            },
        )
        .await?;

        Ok(CompletedRegistration {
            operation_id: pipeline.operation_id(),
            validation_id: extracted.validation_id,
            finalization,
        })
    }
}
