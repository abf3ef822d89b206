//! Explicit state machine for each validator-set change. Every transition is
//! serializable so progress can be journaled and inspected after the fact.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::contract::DispatchMode;
use crate::utils::errors::{OrchestratorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineKind {
    Registration,
    RegistrationCompletion,
    RemovalInitiation,
    WeightUpdateInitiation,
    RemovalCompletion,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineKind::Registration => "registration",
            PipelineKind::RegistrationCompletion => "registration-completion",
            PipelineKind::RemovalInitiation => "removal-initiation",
            PipelineKind::WeightUpdateInitiation => "weight-update-initiation",
            PipelineKind::RemovalCompletion => "removal-completion",
        };
        f.write_str(name)
    }
}

/// Coarse step an error or a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStage {
    Validating,
    Submitting,
    AwaitingReceipt,
    Fallback,
    Extracting,
    Aggregating,
    Finalizing,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validating => "validation",
            PipelineStage::Submitting => "submission",
            PipelineStage::AwaitingReceipt => "receipt wait",
            PipelineStage::Fallback => "fallback",
            PipelineStage::Extracting => "message extraction",
            PipelineStage::Aggregating => "signature aggregation",
            PipelineStage::Finalizing => "finalization",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum PipelineState {
    Idle,
    Validating,
    Submitting { mode: DispatchMode },
    AwaitingReceipt { tx_hash: B256 },
    Fallback { reason: String },
    Extracted { validation_id: Option<B256> },
    Aggregating,
    Finalizing,
    Proposed { proposal_id: String },
    Succeeded,
    Failed { stage: PipelineStage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Proposed { .. } | PipelineState::Succeeded | PipelineState::Failed { .. }
        )
    }

    fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::Submitting { .. } => "submitting",
            PipelineState::AwaitingReceipt { .. } => "awaitingReceipt",
            PipelineState::Fallback { .. } => "fallback",
            PipelineState::Extracted { .. } => "extracted",
            PipelineState::Aggregating => "aggregating",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Proposed { .. } => "proposed",
            PipelineState::Succeeded => "succeeded",
            PipelineState::Failed { .. } => "failed",
        }
    }

    /// Whether `next` may follow `self`.
    pub fn allows(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed { .. }) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Submitting { .. })
                | (Validating, AwaitingReceipt { .. })
                | (Submitting { .. }, AwaitingReceipt { .. })
                | (Submitting { .. }, Proposed { .. })
                | (Submitting { .. }, Fallback { .. })
                | (AwaitingReceipt { .. }, Extracted { .. })
                | (AwaitingReceipt { .. }, Fallback { .. })
                | (Fallback { .. }, AwaitingReceipt { .. })
                | (Extracted { .. }, Aggregating)
                | (Extracted { .. }, Succeeded)
                | (Aggregating, Finalizing)
                | (Finalizing, Succeeded)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTransition {
    pub operation_id: Uuid,
    pub kind: PipelineKind,
    pub state: PipelineState,
    pub recorded_at: i64,
}

/// One in-flight validator operation.
#[derive(Debug, Clone)]
pub struct Pipeline {
    operation_id: Uuid,
    kind: PipelineKind,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            kind,
            state: PipelineState::Idle,
        }
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Move to `next`, returning the transition to journal.
    pub fn advance(&mut self, next: PipelineState) -> Result<PipelineTransition> {
        if !self.state.allows(&next) {
            return Err(OrchestratorError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(PipelineTransition {
            operation_id: self.operation_id,
            kind: self.kind,
            state: self.state.clone(),
            recorded_at: chrono::Utc::now().timestamp(),
        })
    }
}
