use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Who may mutate a validator manager contract, from the caller's view.
/// Recomputed per session, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OwnershipState {
    Loading,
    /// Owned by a multisig contract; calls become proposals to it.
    ContractOwned { multisig: Address },
    OwnedByCaller,
    OwnedByOtherAccount { owner: Address },
}

impl OwnershipState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, OwnershipState::Loading)
    }
}
