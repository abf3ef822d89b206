use alloy_primitives::B256;
use thiserror::Error;

use crate::models::pipeline::PipelineStage;
use crate::services::registration_service::RegistrationOutcome;

/// Known fragments of wallet/node error text and the category they map to.
const USER_REJECTED: &[&str] = &["user rejected", "user denied", "rejected the request"];
const INSUFFICIENT_FUNDS: &[&str] = &["insufficient funds", "insufficient balance"];
const NONCE_CONFLICT: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "replacement transaction underpriced",
    "already known",
];
const REVERTED: &[&str] = &["execution reverted", "reverted", "revert"];

/// Stable category of an execution-chain failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Transaction was rejected by the signer")]
    UserRejected,

    #[error("Insufficient funds to pay for the transaction")]
    InsufficientFunds,

    #[error("Nonce conflict, another transaction from this account is pending")]
    NonceConflict,

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("{0}")]
    Unrecognized(String),
}

impl ExecutionError {
    /// Classify raw collaborator error text. Unknown text is kept verbatim.
    pub fn classify(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        let matches = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

        if matches(USER_REJECTED) {
            ExecutionError::UserRejected
        } else if matches(INSUFFICIENT_FUNDS) {
            ExecutionError::InsufficientFunds
        } else if matches(NONCE_CONFLICT) {
            ExecutionError::NonceConflict
        } else if matches(REVERTED) {
            ExecutionError::Reverted(raw.to_string())
        } else {
            ExecutionError::Unrecognized(raw.to_string())
        }
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, ExecutionError::Reverted(_))
    }
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Ownership of the validator manager has not been resolved yet")]
    OwnershipUnresolved,

    #[error("Execution error during {stage}: {error}")]
    Execution {
        stage: PipelineStage,
        error: ExecutionError,
    },

    #[error("Failed to decode warp message from receipt {tx_hash}: {reason}")]
    Decode { tx_hash: B256, reason: String },

    #[error("Primary transaction reverted ({primary}) and no validation exists for node {node_id}")]
    NoExistingValidation { node_id: String, primary: String },

    #[error("Primary call failed: {primary}; fallback resend failed: {fallback}")]
    FallbackFailed { primary: String, fallback: String },

    #[error("Signature aggregation failed: {0}")]
    Aggregation(String),

    #[error("Finalization failed: {0}")]
    Finalization(String),

    #[error("Not found: {0}")]
    RecordNotFound(String),

    #[error("{stage} failed: {message}")]
    Collaborator {
        stage: PipelineStage,
        message: String,
    },

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A later validator in a batch failed. Validators before it were
    /// already registered on-chain and are returned in `completed`.
    #[error("Registration of node {node_id} failed after {} validator(s) completed: {source}", .completed.len())]
    BatchInterrupted {
        node_id: String,
        completed: Vec<RegistrationOutcome>,
        #[source]
        source: Box<OrchestratorError>,
    },
}

impl OrchestratorError {
    /// Wrap a collaborator failure, classifying it as an execution error.
    pub fn execution(stage: PipelineStage, err: &anyhow::Error) -> Self {
        OrchestratorError::Execution {
            stage,
            error: ExecutionError::classify(&format!("{:#}", err)),
        }
    }

    /// Wrap a collaborator failure whose text is surfaced as-is.
    pub fn collaborator(stage: PipelineStage, err: &anyhow::Error) -> Self {
        OrchestratorError::Collaborator {
            stage,
            message: format!("{:#}", err),
        }
    }

    /// The pipeline stage this error was raised from.
    pub fn stage(&self) -> PipelineStage {
        match self {
            OrchestratorError::Validation(_)
            | OrchestratorError::Unauthorized(_)
            | OrchestratorError::OwnershipUnresolved
            | OrchestratorError::RecordNotFound(_) => PipelineStage::Validating,
            OrchestratorError::Execution { stage, .. } => *stage,
            OrchestratorError::Collaborator { stage, .. } => *stage,
            OrchestratorError::Decode { .. } => PipelineStage::Extracting,
            OrchestratorError::NoExistingValidation { .. }
            | OrchestratorError::FallbackFailed { .. } => PipelineStage::Fallback,
            OrchestratorError::Aggregation(_) => PipelineStage::Aggregating,
            OrchestratorError::Finalization(_) => PipelineStage::Finalizing,
            OrchestratorError::InvalidTransition { .. } => PipelineStage::Validating,
            OrchestratorError::BatchInterrupted { source, .. } => source.stage(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
