use serde::{Deserialize, Serialize};

use crate::models::validator::SubnetId;
use crate::services::signature_aggregation_service::DEFAULT_QUORUM_PERCENTAGE;

/// Settings shared by the coordinators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// The L1 whose validator set is being changed.
    pub subnet_id: SubnetId,
    /// Subnet whose validators sign warp messages; the L1 itself when unset.
    pub signing_subnet_id: Option<SubnetId>,
    pub quorum_percentage: u8,
    /// Refuse weight changes while the total L1 stake is unknown.
    pub require_total_stake: bool,
}

impl OrchestratorConfig {
    pub fn new(subnet_id: SubnetId) -> Self {
        Self {
            subnet_id,
            signing_subnet_id: None,
            quorum_percentage: DEFAULT_QUORUM_PERCENTAGE,
            require_total_stake: false,
        }
    }

    pub fn signing_subnet(&self) -> SubnetId {
        self.signing_subnet_id
            .clone()
            .unwrap_or_else(|| self.subnet_id.clone())
    }
}
