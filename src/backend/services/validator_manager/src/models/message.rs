use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::models::validator::ProofOfPossession;

/// Cross-chain payload pulled out of a receipt. Its schema is only known
/// from the log that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedMessage(pub Bytes);

impl UnsignedMessage {
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Quorum-signed form of an `UnsignedMessage`, as returned by the
/// aggregation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMessage {
    pub unsigned: UnsignedMessage,
    pub signed: Bytes,
    pub quorum_percentage: u8,
}

/// Which receipt log the unsigned message was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageSource {
    Precompile,
    SecondLog,
    FirstLog,
}

/// Canonical decode of a receipt: message plus whatever the validator
/// manager events told us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMessage {
    pub tx_hash: B256,
    pub unsigned_message: UnsignedMessage,
    pub source: MessageSource,
    pub validation_id: Option<B256>,
    pub weight: Option<u64>,
    pub end_time: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeEventKind {
    Removal,
    WeightUpdate,
    /// Built from the precompile log alone; weight and end time unknown.
    PrecompileOnly,
}

/// Event payload accompanying a removal or weight-update message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorChangeEvent {
    pub kind: ChangeEventKind,
    pub validation_id: Option<B256>,
    pub message_id: B256,
    pub nonce: Option<u64>,
    pub weight: Option<u64>,
    pub end_time: Option<u64>,
}

/// What the root chain is asked to commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinalizationRequest {
    RegisterValidator {
        signed: SignedMessage,
        balance: u64,
        proof_of_possession: ProofOfPossession,
    },
    SetWeight {
        signed: SignedMessage,
    },
}

impl FinalizationRequest {
    pub fn signed_message(&self) -> &SignedMessage {
        match self {
            FinalizationRequest::RegisterValidator { signed, .. } => signed,
            FinalizationRequest::SetWeight { signed } => signed,
        }
    }
}

/// Root-chain answer to a finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Finalization {
    Submitted { tx_id: String },
    /// The change was committed by an earlier submission.
    AlreadyApplied,
}

impl Finalization {
    pub fn tx_id(&self) -> Option<&str> {
        match self {
            Finalization::Submitted { tx_id } => Some(tx_id),
            Finalization::AlreadyApplied => None,
        }
    }
}
