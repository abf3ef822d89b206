use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::pipeline::{Pipeline, PipelineState};
use crate::repositories::traits::PipelineJournal;
use crate::utils::errors::{OrchestratorError, Result};

/// Applies pipeline transitions and journals them.
pub(crate) struct PipelineRecorder {
    journal: Arc<dyn PipelineJournal>,
}

impl PipelineRecorder {
    pub(crate) fn new(journal: Arc<dyn PipelineJournal>) -> Self {
        Self { journal }
    }

    pub(crate) async fn advance(&self, pipeline: &mut Pipeline, next: PipelineState) -> Result<()> {
        let transition = pipeline.advance(next)?;
        info!(
            operation_id = %transition.operation_id,
            kind = %transition.kind,
            state = %transition.state,
            "pipeline transition"
        );

        // On-chain effects already happened; a journal outage must not hide them.
        if let Err(e) = self.journal.record(transition).await {
            warn!(operation_id = %pipeline.operation_id(), error = %e, "failed to journal transition");
        }
        Ok(())
    }

    /// Move a pipeline that hit `err` into its failed state.
    pub(crate) async fn fail(&self, pipeline: &mut Pipeline, err: &OrchestratorError) {
        if pipeline.state().is_terminal() {
            return;
        }
        let failed = PipelineState::Failed {
            stage: err.stage(),
            reason: err.to_string(),
        };
        if let Err(e) = self.advance(pipeline, failed).await {
            error!(operation_id = %pipeline.operation_id(), error = %e, "could not record pipeline failure");
        }
    }
}
