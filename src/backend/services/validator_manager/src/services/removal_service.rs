use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::models::{
    contract::{ContractCall, DispatchMode},
    message::{Finalization, FinalizationRequest, UnsignedMessage, ValidatorChangeEvent},
    pipeline::{Pipeline, PipelineKind, PipelineStage, PipelineState},
    receipt::TransactionReceipt,
    validator::{SubnetId, ValidationRecord, ValidationStatus},
};
use crate::repositories::traits::{ExecutionChain, PipelineJournal, RootChain, SignatureAggregator};
use crate::services::completion::{fetch_receipt, sign_and_finalize};
use crate::services::dispatcher::CallDispatcher;
use crate::services::enforce_stake_cap;
use crate::services::finalization_service::FinalizationService;
use crate::services::message_extractor::extract_removal;
use crate::services::ownership_service::ManagerSession;
use crate::services::signature_aggregation_service::SignatureAggregationService;
use crate::services::submission::{submit_primary, submit_resend, Submission};
use crate::services::tracking::PipelineRecorder;
use crate::utils::errors::{ExecutionError, OrchestratorError, Result};

/// Result of sending an initiating removal or weight-update call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum InitiationOutcome {
    Executed {
        operation_id: Uuid,
        tx_hash: B256,
        validation_id: B256,
        event: ValidatorChangeEvent,
        unsigned_message: UnsignedMessage,
        resent: bool,
    },
    Proposed {
        operation_id: Uuid,
        validation_id: B256,
        proposal_id: String,
    },
}

impl InitiationOutcome {
    /// Hash to pass to `complete_removal`, when the call was executed.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            InitiationOutcome::Executed { tx_hash, .. } => Some(*tx_hash),
            InitiationOutcome::Proposed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompleteRemovalRequest {
    /// Initiating transaction, possibly sent in an earlier session.
    pub tx_hash: B256,
    pub signing_subnet_id: Option<SubnetId>,
    pub quorum_percentage: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalResult {
    pub operation_id: Uuid,
    pub tx_hash: B256,
    pub event: ValidatorChangeEvent,
    pub unsigned_message: UnsignedMessage,
    pub finalization: Finalization,
}

impl RemovalResult {
    pub fn root_chain_tx_id(&self) -> Option<&str> {
        self.finalization.tx_id()
    }
}

/// Removes or re-weights existing validators. Unlike registration, the
/// change is only useful once finalized, so completion runs end to end.
pub struct RemovalService {
    chain: Arc<dyn ExecutionChain>,
    aggregation: SignatureAggregationService,
    finalization: FinalizationService,
    recorder: PipelineRecorder,
    config: OrchestratorConfig,
}

impl RemovalService {
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

    async fn current_record(&self, session: &ManagerSession, validation_id: B256) -> Result<ValidationRecord> {
        self.chain
            .validator(session.manager(), validation_id)
            .await
            .map_err(|e| OrchestratorError::collaborator(PipelineStage::Validating, &e))?
            .ok_or_else(|| {
                OrchestratorError::RecordNotFound(format!(
                    "validation {} on manager {}",
                    validation_id,
                    session.manager()
                ))
            })
    }

    pub async fn initiate_removal(
        &self,
        session: &ManagerSession,
        validation_id: B256,
    ) -> Result<InitiationOutcome> {
        let dispatcher = session.authorize()?;
        let mut pipeline = Pipeline::new(PipelineKind::RemovalInitiation);
        let result = self
            .initiate_removal_inner(&mut pipeline, session, dispatcher.as_ref(), validation_id)
            .await;
        if let Err(e) = &result {
            error!(%validation_id, error = %e, "removal initiation failed");
            self.recorder.fail(&mut pipeline, e).await;
        }
        result
    }

    async fn initiate_removal_inner(
        &self,
        pipeline: &mut Pipeline,
        session: &ManagerSession,
        dispatcher: &dyn CallDispatcher,
        validation_id: B256,
    ) -> Result<InitiationOutcome> {
        let recorder = &self.recorder;
        recorder.advance(pipeline, PipelineState::Validating).await?;

        let record = self.current_record(session, validation_id).await?;
        if record.status == ValidationStatus::Removed {
            return Err(OrchestratorError::Validation(format!(
                "validation {} is already removed",
                validation_id
            )));
        }

        recorder
            .advance(pipeline, PipelineState::Submitting { mode: dispatcher.mode() })
            .await?;
        let call = ContractCall::initiate_removal(session.manager(), validation_id);
        let (receipt, resent) =
            match submit_primary(recorder, pipeline, self.chain.as_ref(), dispatcher, call).await? {
                Submission::Proposed { proposal_id } => {
                    return self.proposed(pipeline, validation_id, proposal_id).await;
                }
                Submission::Confirmed(receipt) => (receipt, false),
                Submission::Reverted { reason } if dispatcher.mode() == DispatchMode::Direct => {
                    let receipt = self.resend_removal(pipeline, session, validation_id, reason).await?;
                    (receipt, true)
                }
                Submission::Reverted { reason } => {
                    return Err(OrchestratorError::Execution {
                        stage: PipelineStage::Submitting,
                        error: ExecutionError::Reverted(reason),
                    });
                }
            };

        self.executed(pipeline, receipt, validation_id, resent).await
    }

    /// The initiating call reverted. A validation already pending removal
    /// only needs its message re-announced.
    async fn resend_removal(
        &self,
        pipeline: &mut Pipeline,
        session: &ManagerSession,
        validation_id: B256,
        primary: String,
    ) -> Result<TransactionReceipt> {
        self.recorder
            .advance(pipeline, PipelineState::Fallback { reason: primary.clone() })
            .await?;

        let record = self
            .chain
            .validator(session.manager(), validation_id)
            .await
            .map_err(|e| OrchestratorError::FallbackFailed {
                primary: primary.clone(),
                fallback: format!("validation lookup failed: {:#}", e),
            })?;
        match record {
            Some(record) if record.status == ValidationStatus::PendingRemoval => {}
            _ => {
                warn!(%validation_id, "removal reverted and validation is not pending removal");
                return Err(OrchestratorError::Execution {
                    stage: PipelineStage::Submitting,
                    error: ExecutionError::Reverted(primary),
                });
            }
        }

        info!(%validation_id, "validation pending removal, resending removal message");
        let call = ContractCall::resend_removal(session.manager(), validation_id);
        submit_resend(&self.recorder, pipeline, self.chain.as_ref(), call, &primary).await
    }

    /// Change a validator's weight, subject to the stake cap. `total_stake`
    /// is 0 when unknown.
    pub async fn initiate_weight_update(
        &self,
        session: &ManagerSession,
        validation_id: B256,
        new_weight: u64,
        total_stake: u64,
    ) -> Result<InitiationOutcome> {
        let dispatcher = session.authorize()?;
        if new_weight == 0 {
            return Err(OrchestratorError::Validation(
                "new weight must be greater than zero, use removal instead".to_string(),
            ));
        }

        let mut pipeline = Pipeline::new(PipelineKind::WeightUpdateInitiation);
        let result = self
            .initiate_weight_update_inner(
                &mut pipeline,
                session,
                dispatcher.as_ref(),
                validation_id,
                new_weight,
                total_stake,
            )
            .await;
        if let Err(e) = &result {
            error!(%validation_id, new_weight, error = %e, "weight update initiation failed");
            self.recorder.fail(&mut pipeline, e).await;
        }
        result
    }

    async fn initiate_weight_update_inner(
        &self,
        pipeline: &mut Pipeline,
        session: &ManagerSession,
        dispatcher: &dyn CallDispatcher,
        validation_id: B256,
        new_weight: u64,
        total_stake: u64,
    ) -> Result<InitiationOutcome> {
        let recorder = &self.recorder;
        recorder.advance(pipeline, PipelineState::Validating).await?;

        let record = self.current_record(session, validation_id).await?;
        if record.status != ValidationStatus::Active {
            return Err(OrchestratorError::Validation(format!(
                "validation {} is {:?}, only active validators can be re-weighted",
                validation_id, record.status
            )));
        }
        enforce_stake_cap(&self.config, new_weight, record.weight, total_stake)?;

        recorder
            .advance(pipeline, PipelineState::Submitting { mode: dispatcher.mode() })
            .await?;
        let call = ContractCall::initiate_weight_update(session.manager(), validation_id, new_weight);
        match submit_primary(recorder, pipeline, self.chain.as_ref(), dispatcher, call).await? {
            Submission::Proposed { proposal_id } => self.proposed(pipeline, validation_id, proposal_id).await,
            Submission::Confirmed(receipt) => self.executed(pipeline, receipt, validation_id, false).await,
            Submission::Reverted { reason } => Err(OrchestratorError::Execution {
                stage: PipelineStage::Submitting,
                error: ExecutionError::Reverted(reason),
            }),
        }
    }

    async fn proposed(
        &self,
        pipeline: &mut Pipeline,
        validation_id: B256,
        proposal_id: String,
    ) -> Result<InitiationOutcome> {
        self.recorder
            .advance(pipeline, PipelineState::Proposed { proposal_id: proposal_id.clone() })
            .await?;
        Ok(InitiationOutcome::Proposed {
            operation_id: pipeline.operation_id(),
            validation_id,
            proposal_id,
        })
    }

    async fn executed(
        &self,
        pipeline: &mut Pipeline,
        receipt: TransactionReceipt,
        validation_id: B256,
        resent: bool,
    ) -> Result<InitiationOutcome> {
        let (message, event) = extract_removal(&receipt)?;
        self.recorder
            .advance(pipeline, PipelineState::Extracted { validation_id: Some(validation_id) })
            .await?;
        self.recorder.advance(pipeline, PipelineState::Succeeded).await?;

        info!(%validation_id, tx_hash = %receipt.transaction_hash, kind = ?event.kind, resent, "validator change initiated");
        Ok(InitiationOutcome::Executed {
            operation_id: pipeline.operation_id(),
            tx_hash: receipt.transaction_hash,
            validation_id,
            event,
            unsigned_message: message.unsigned_message,
            resent,
        })
    }

    /// Finalize a removal or weight update from its initiating transaction.
    pub async fn complete_removal(&self, request: CompleteRemovalRequest) -> Result<RemovalResult> {
        let mut pipeline = Pipeline::new(PipelineKind::RemovalCompletion);
        let result = self.complete_removal_inner(&mut pipeline, request).await;
        if let Err(e) = &result {
            error!(operation_id = %pipeline.operation_id(), error = %e, "removal completion failed");
            self.recorder.fail(&mut pipeline, e).await;
        }
        result
    }

    async fn complete_removal_inner(
        &self,
        pipeline: &mut Pipeline,
        request: CompleteRemovalRequest,
    ) -> Result<RemovalResult> {
        let recorder = &self.recorder;
        recorder.advance(pipeline, PipelineState::Validating).await?;

        let receipt = fetch_receipt(recorder, pipeline, self.chain.as_ref(), request.tx_hash).await?;
        let (message, event) = extract_removal(&receipt)?;
        recorder
            .advance(pipeline, PipelineState::Extracted { validation_id: event.validation_id })
            .await?;

        let signing_subnet = request
            .signing_subnet_id
            .unwrap_or_else(|| self.config.signing_subnet());
        let quorum = request.quorum_percentage.unwrap_or(self.config.quorum_percentage);

        let (_, finalization) = sign_and_finalize(
            recorder,
            pipeline,
            &self.aggregation,
            &self.finalization,
            &message.unsigned_message,
            &signing_subnet,
            quorum,
            |signed| FinalizationRequest::SetWeight { signed },
        )
        .await?;

        Ok(RemovalResult {
            operation_id: pipeline.operation_id(),
            tx_hash: request.tx_hash,
            event,
            unsigned_message: message.unsigned_message,
            finalization,
        })
    }
}
