use std::sync::Arc;
use tracing::{error, info};

use crate::models::message::{Finalization, FinalizationRequest};
use crate::repositories::traits::RootChain;
use crate::utils::errors::{OrchestratorError, Result};

/// Root-chain rejections meaning the change is already committed.
const ALREADY_APPLIED: &[&str] = &[
    "already issued",
    "already applied",
    "already finalized",
    "already registered",
    "duplicate",
];

pub(crate) fn is_already_applied(message: &str) -> bool {
    let lowered = message.to_lowercase();
    ALREADY_APPLIED.iter().any(|m| lowered.contains(m))
}

/// Commits a signed message on the root chain.
pub struct FinalizationService {
    root_chain: Arc<dyn RootChain>,
}

impl FinalizationService {
    pub fn new(root_chain: Arc<dyn RootChain>) -> Self {
        Self { root_chain }
    }

    /// Submit once. An "already applied" rejection counts as success so a
    /// rerun after an ambiguous failure converges.
    pub async fn submit(&self, request: FinalizationRequest) -> Result<Finalization> {
        match self.root_chain.submit(request).await {
            Ok(tx_id) => {
                info!(%tx_id, "finalization submitted");
                Ok(Finalization::Submitted { tx_id })
            }
            Err(e) => {
                let message = format!("{:#}", e);
                if is_already_applied(&message) {
                    info!(%message, "change already finalized on the root chain");
                    Ok(Finalization::AlreadyApplied)
                } else {
                    error!(%message, "finalization failed");
                    Err(OrchestratorError::Finalization(message))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_already_applied_rejections() {
        assert!(is_already_applied("warp message Already Issued for validation"));
        assert!(is_already_applied("duplicate transaction"));
        assert!(!is_already_applied("insufficient funds"));
    }
}
