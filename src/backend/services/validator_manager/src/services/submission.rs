use tracing::{info, warn};

use crate::models::{
    contract::{ContractCall, DispatchOutcome},
    pipeline::{Pipeline, PipelineStage, PipelineState},
    receipt::TransactionReceipt,
};
use crate::repositories::traits::ExecutionChain;
use crate::services::dispatcher::CallDispatcher;
use crate::services::tracking::PipelineRecorder;
use crate::utils::errors::{ExecutionError, OrchestratorError, Result};

/// Where the primary call ended up.
pub(crate) enum Submission {
    Confirmed(TransactionReceipt),
    Proposed { proposal_id: String },
    /// Reverted at send time or in the receipt; a fallback may apply.
    Reverted { reason: String },
}

/// Dispatch the primary call and, when executed, wait for its receipt.
pub(crate) async fn submit_primary(
    recorder: &PipelineRecorder,
    pipeline: &mut Pipeline,
    chain: &dyn ExecutionChain,
    dispatcher: &dyn CallDispatcher,
    call: ContractCall,
) -> Result<Submission> {
    let function = call.function_name().to_string();

    match dispatcher.dispatch(call).await {
        Ok(DispatchOutcome::Proposed { proposal_id }) => {
            info!(%function, %proposal_id, "call awaiting multisig co-signature");
            Ok(Submission::Proposed { proposal_id })
        }
        Ok(DispatchOutcome::Executed { tx_hash }) => {
            recorder
                .advance(pipeline, PipelineState::AwaitingReceipt { tx_hash })
                .await?;
            let receipt = chain
                .wait_for_receipt(tx_hash)
                .await
                .map_err(|e| OrchestratorError::execution(PipelineStage::AwaitingReceipt, &e))?;

            if receipt.success {
                Ok(Submission::Confirmed(receipt))
            } else {
                warn!(%function, %tx_hash, "transaction reverted");
                Ok(Submission::Reverted {
                    reason: format!("transaction {} reverted", tx_hash),
                })
            }
        }
        Err(e) => {
            let error = ExecutionError::classify(&format!("{:#}", e));
            if error.is_revert() {
                warn!(%function, error = %error, "call reverted before broadcast");
                Ok(Submission::Reverted {
                    reason: error.to_string(),
                })
            } else {
                Err(OrchestratorError::Execution {
                    stage: PipelineStage::Submitting,
                    error,
                })
            }
        }
    }
}

/// Send a resend call directly. Any failure is reported together with the
/// primary failure that led here.
pub(crate) async fn submit_resend(
    recorder: &PipelineRecorder,
    pipeline: &mut Pipeline,
    chain: &dyn ExecutionChain,
    call: ContractCall,
    primary: &str,
) -> Result<TransactionReceipt> {
    let compound = |fallback: String| OrchestratorError::FallbackFailed {
        primary: primary.to_string(),
        fallback,
    };
    let function = call.function_name().to_string();

    let tx_hash = chain
        .send_transaction(call)
        .await
        .map_err(|e| compound(ExecutionError::classify(&format!("{:#}", e)).to_string()))?;
    info!(%function, %tx_hash, "resend transaction sent");

    recorder
        .advance(pipeline, PipelineState::AwaitingReceipt { tx_hash })
        .await?;
    let receipt = chain
        .wait_for_receipt(tx_hash)
        .await
        .map_err(|e| compound(format!("{:#}", e)))?;

    if !receipt.success {
        return Err(compound(format!("resend transaction {} reverted", tx_hash)));
    }
    Ok(receipt)
}
