use alloy_primitives::B256;
use tracing::info;

use crate::models::{
    message::{Finalization, FinalizationRequest, SignedMessage, UnsignedMessage},
    pipeline::{Pipeline, PipelineStage, PipelineState},
    receipt::TransactionReceipt,
    validator::SubnetId,
};
use crate::repositories::traits::ExecutionChain;
use crate::services::finalization_service::FinalizationService;
use crate::services::signature_aggregation_service::SignatureAggregationService;
use crate::services::tracking::PipelineRecorder;
use crate::utils::errors::{ExecutionError, OrchestratorError, Result};

/// Fetch the receipt of a transaction sent earlier, possibly by another
/// session. A reverted transaction carries no message to relay.
pub(crate) async fn fetch_receipt(
    recorder: &PipelineRecorder,
    pipeline: &mut Pipeline,
    chain: &dyn ExecutionChain,
    tx_hash: B256,
) -> Result<TransactionReceipt> {
    recorder
        .advance(pipeline, PipelineState::AwaitingReceipt { tx_hash })
        .await?;
    let receipt = chain
        .wait_for_receipt(tx_hash)
        .await
        .map_err(|e| OrchestratorError::execution(PipelineStage::AwaitingReceipt, &e))?;

    if !receipt.success {
        return Err(OrchestratorError::Execution {
            stage: PipelineStage::AwaitingReceipt,
            error: ExecutionError::Reverted(format!("transaction {} reverted", tx_hash)),
        });
    }
    Ok(receipt)
}

/// Quorum-sign `message` and commit it on the root chain. Both steps run
/// exactly once.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn sign_and_finalize<F>(
    recorder: &PipelineRecorder,
    pipeline: &mut Pipeline,
    aggregation: &SignatureAggregationService,
    finalization: &FinalizationService,
    message: &UnsignedMessage,
    signing_subnet_id: &SubnetId,
    quorum_percentage: u8,
    request: F,
) -> Result<(SignedMessage, Finalization)>
where
    F: FnOnce(SignedMessage) -> FinalizationRequest,
{
    recorder.advance(pipeline, PipelineState::Aggregating).await?;
    let signed = aggregation
        .aggregate(message, signing_subnet_id, quorum_percentage)
        .await?;

    recorder.advance(pipeline, PipelineState::Finalizing).await?;
    let finalized = finalization.submit(request(signed.clone())).await?;
    info!(
        operation_id = %pipeline.operation_id(),
        tx_id = finalized.tx_id().unwrap_or("already applied"),
        "validator set change finalized"
    );

    recorder.advance(pipeline, PipelineState::Succeeded).await?;
    Ok((signed, finalized))
}
