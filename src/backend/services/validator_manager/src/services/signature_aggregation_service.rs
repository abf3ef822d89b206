use std::sync::Arc;
use tracing::{error, info};

use crate::models::{
    message::{SignedMessage, UnsignedMessage},
    validator::SubnetId,
};
use crate::repositories::traits::SignatureAggregator;
use crate::utils::errors::{OrchestratorError, Result};

pub const DEFAULT_QUORUM_PERCENTAGE: u8 = 67;

/// Single blocking request for a quorum signature. Never retried: a second
/// round could sign a different view of nonce-sensitive state.
pub struct SignatureAggregationService {
    aggregator: Arc<dyn SignatureAggregator>,
}

impl SignatureAggregationService {
    pub fn new(aggregator: Arc<dyn SignatureAggregator>) -> Self {
        Self { aggregator }
    }

    pub async fn aggregate(
        &self,
        message: &UnsignedMessage,
        signing_subnet_id: &SubnetId,
        quorum_percentage: u8,
    ) -> Result<SignedMessage> {
        if quorum_percentage == 0 || quorum_percentage > 100 {
            return Err(OrchestratorError::Validation(format!(
                "quorum percentage {} must be between 1 and 100",
                quorum_percentage
            )));
        }
        if message.is_empty() {
            return Err(OrchestratorError::Validation(
                "cannot aggregate signatures over an empty message".to_string(),
            ));
        }

        info!(signing_subnet = %signing_subnet_id, quorum_percentage, "requesting signature aggregation");
        let signed = self
            .aggregator
            .aggregate(message.clone(), signing_subnet_id.clone(), quorum_percentage)
            .await
            .map_err(|e| {
                error!(error = %e, "signature aggregation failed");
                OrchestratorError::Aggregation(format!("{:#}", e))
            })?;

        if signed.is_empty() {
            return Err(OrchestratorError::Aggregation(
                "aggregator returned an empty signed message".to_string(),
            ));
        }

        Ok(SignedMessage {
            unsigned: message.clone(),
            signed,
            quorum_percentage,
        })
    }
}
