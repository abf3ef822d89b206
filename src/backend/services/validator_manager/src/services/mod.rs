pub mod dispatcher;
pub mod finalization_service;
pub mod message_extractor;
pub mod ownership_service;
pub mod registration_service;
pub mod removal_service;
pub mod signature_aggregation_service;

mod completion;
mod submission;
mod tracking;

use tracing::warn;

use crate::config::OrchestratorConfig;
use crate::utils::errors::{OrchestratorError, Result};
use crate::utils::stake_weight::{check_weight_change, StakeCheck};

/// Apply the weight cap, honouring the unknown-total policy.
pub(crate) fn enforce_stake_cap(
    config: &OrchestratorConfig,
    proposed: u64,
    current: u64,
    total: u64,
) -> Result<StakeCheck> {
    if total == 0 && config.require_total_stake {
        return Err(OrchestratorError::Validation(
            "total L1 stake is unknown and weight changes require it".to_string(),
        ));
    }

    let check = check_weight_change(proposed, current, total)?;
    if check == StakeCheck::Skipped {
        warn!(proposed, current, "total L1 stake unknown, weight cap left to the contract");
    }
    Ok(check)
}
