use alloy_primitives::B256;
use anyhow::{anyhow, Result};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

use validator_manager::{
    models::{
        message::Finalization,
        ownership::OwnershipState,
        validator::{ProofOfPossession, SubnetId},
    },
    repositories::{journal::JsonFileJournal, traits::PipelineJournal},
    services::{
        registration_service::{CompleteRegistrationRequest, RegistrationOutcome, RegistrationRequest},
        removal_service::{CompleteRemovalRequest, InitiationOutcome},
    },
    OrchestratorError,
};

use crate::{api::OrchestratorApi, config::Config, types::load_validators};

fn describe_finalization(finalization: &Finalization) -> String {
    match finalization {
        Finalization::Submitted { tx_id } => format!("root chain transaction {}", tx_id),
        Finalization::AlreadyApplied => "already applied on the root chain".to_string(),
    }
}

fn print_initiation(outcome: &InitiationOutcome) {
    match outcome {
        InitiationOutcome::Executed {
            operation_id,
            tx_hash,
            validation_id,
            event,
            unsigned_message,
            resent,
        } => {
            println!("Operation: {}", operation_id);
            println!("Transaction hash: {}", tx_hash);
            println!("Validation ID: {}", validation_id);
            if *resent {
                println!("Message re-announced for an already pending change");
            }
            if let Some(weight) = event.weight {
                println!("Weight: {}", weight);
            }
            if let Some(end_time) = event.end_time {
                println!("End time: {}", end_time);
            }
            println!("Unsigned message: 0x{}", hex::encode(unsigned_message.as_bytes()));
            println!("Finalize with: complete-removal --tx {}", tx_hash);
        }
        InitiationOutcome::Proposed {
            operation_id,
            validation_id,
            proposal_id,
        } => {
            println!("Operation: {}", operation_id);
            println!("Proposed to the owning multisig for validation {}", validation_id);
            println!("Proposal: {}", proposal_id);
            println!("The change is pending co-signature and is not finalized.");
        }
    }
}

/// Commands for validator set changes
pub struct ValidatorCommands;

impl ValidatorCommands {
    /// Show who owns the validator manager and how calls would be sent
    pub async fn ownership(api: &OrchestratorApi) -> Result<()> {
        let session = api.session().await?;
        println!("Validator manager: {}", session.manager());
        match session.ownership() {
            OwnershipState::OwnedByCaller => println!("Owned by caller {}; calls are sent directly", session.caller()),
            OwnershipState::ContractOwned { multisig } => {
                println!("Owned by multisig {}; calls become proposals", multisig)
            }
            OwnershipState::OwnedByOtherAccount { owner } => {
                println!("Owned by {}; caller {} is not authorized", owner, session.caller())
            }
            OwnershipState::Loading => println!("Ownership unresolved"),
        }
        Ok(())
    }

    /// Register the validators listed in `file`, optionally finalizing them
    pub async fn register_validator(api: &OrchestratorApi, file: &Path, complete: bool) -> Result<()> {
        let validators = load_validators(file)?;
        let session = api.session().await?;
        let total_stake = api.total_stake().await?;

        let outcomes = match api
            .registration
            .register(&session, RegistrationRequest { validators, total_stake })
            .await
        {
            Ok(outcomes) => outcomes,
            Err(OrchestratorError::BatchInterrupted {
                node_id,
                completed,
                source,
            }) => {
                for outcome in completed {
                    Self::report_registration(api, outcome, complete).await?;
                }
                return Err(anyhow!("registration of node {} failed: {}", node_id, source));
            }
            Err(e) => return Err(e.into()),
        };

        for outcome in outcomes {
            Self::report_registration(api, outcome, complete).await?;
        }
        Ok(())
    }

    async fn report_registration(api: &OrchestratorApi, outcome: RegistrationOutcome, complete: bool) -> Result<()> {
        match outcome {
            RegistrationOutcome::Executed(result) => {
                println!("Validator {} registration initiated", result.node_id);
                println!("  Operation: {}", result.operation_id);
                println!("  Transaction hash: {}", result.tx_hash);
                println!("  Validation ID: {}", result.validation_id);
                println!("  Weight: {}", result.weight);
                if result.resent {
                    println!("  Existing validation re-announced");
                }

                if complete {
                    let completed = api
                        .registration
                        .complete_registration(CompleteRegistrationRequest {
                            tx_hash: result.tx_hash,
                            balance: result.balance,
                            proof_of_possession: result.bls_proof_of_possession,
                            signing_subnet_id: None,
                            quorum_percentage: None,
                        })
                        .await?;
                    println!("  Finalized: {}", describe_finalization(&completed.finalization));
                } else {
                    println!(
                        "  Finalize with: complete-registration --tx {} --balance {}",
                        result.tx_hash, result.balance
                    );
                }
            }
            RegistrationOutcome::Proposed {
                node_id, proposal_id, ..
            } => {
                println!("Validator {} registration proposed to the owning multisig", node_id);
                println!("  Proposal: {}", proposal_id);
                println!("  Pending co-signature; nothing is registered yet.");
            }
        }
        Ok(())
    }

    pub async fn complete_registration(
        api: &OrchestratorApi,
        tx_hash: B256,
        balance: u64,
        proof_of_possession: &str,
    ) -> Result<()> {
        let proof_of_possession = ProofOfPossession::from_hex(proof_of_possession).map_err(|e| anyhow!(e))?;
        let completed = api
            .registration
            .complete_registration(CompleteRegistrationRequest {
                tx_hash,
                balance,
                proof_of_possession,
                signing_subnet_id: None,
                quorum_percentage: None,
            })
            .await?;

        println!("Operation: {}", completed.operation_id);
        if let Some(validation_id) = completed.validation_id {
            println!("Validation ID: {}", validation_id);
        }
        println!("Registration finalized: {}", describe_finalization(&completed.finalization));
        Ok(())
    }

    pub async fn initiate_removal(api: &OrchestratorApi, validation_id: B256) -> Result<()> {
        let session = api.session().await?;
        let outcome = api.removal.initiate_removal(&session, validation_id).await?;
        print_initiation(&outcome);
        Ok(())
    }

    pub async fn update_weight(api: &OrchestratorApi, validation_id: B256, weight: u64) -> Result<()> {
        let session = api.session().await?;
        let total_stake = api.total_stake().await?;
        let outcome = api
            .removal
            .initiate_weight_update(&session, validation_id, weight, total_stake)
            .await?;
        print_initiation(&outcome);
        Ok(())
    }

    pub async fn complete_removal(
        api: &OrchestratorApi,
        tx_hash: B256,
        signing_subnet: Option<&str>,
        quorum: Option<u8>,
    ) -> Result<()> {
        let result = api
            .removal
            .complete_removal(CompleteRemovalRequest {
                tx_hash,
                signing_subnet_id: signing_subnet.map(|s| SubnetId(s.to_string())),
                quorum_percentage: quorum,
            })
            .await?;

        println!("Operation: {}", result.operation_id);
        if let Some(validation_id) = result.event.validation_id {
            println!("Validation ID: {}", validation_id);
        }
        match (result.event.weight, result.event.end_time) {
            (Some(weight), Some(end_time)) => println!("Weight: {}, end time: {}", weight, end_time),
            (Some(weight), None) => println!("Weight: {}", weight),
            _ => println!("Weight and end time not present in the receipt"),
        }
        println!("Change finalized: {}", describe_finalization(&result.finalization));
        Ok(())
    }

    /// Print journaled transitions, for one operation or all of them
    pub async fn history(config: &Config, operation: Option<&str>) -> Result<()> {
        let path = config
            .journal_path
            .clone()
            .ok_or_else(|| anyhow!("journal_path is not configured"))?;
        let journal = JsonFileJournal::new(path);

        let operations = match operation {
            Some(id) => vec![Uuid::from_str(id)?],
            None => journal.operations().await?,
        };
        if operations.is_empty() {
            println!("No operations recorded.");
        }

        for operation_id in operations {
            let history = journal.history(operation_id).await?;
            let kind = history.first().map(|t| t.kind.to_string()).unwrap_or_default();
            println!("{} {}", operation_id, kind);
            for transition in history {
                println!("  {} {}", transition.recorded_at, serde_json::to_string(&transition.state)?);
            }
        }
        Ok(())
    }
}
