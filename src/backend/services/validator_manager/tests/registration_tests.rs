mod common;

use alloy_primitives::{Address, B256};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use common::*;
use validator_manager::{
    models::{
        message::{Finalization, FinalizationRequest},
        ownership::OwnershipState,
        pipeline::{PipelineStage, PipelineState},
    },
    repositories::{journal::InMemoryJournal, traits::PipelineJournal},
    services::{
        dispatcher::{CallDispatcher, DirectDispatcher, MultisigDispatcher},
        ownership_service::ManagerSession,
        registration_service::{
            CompleteRegistrationRequest, RegistrationOutcome, RegistrationRequest, RegistrationService,
        },
    },
    ExecutionError, OrchestratorConfig, OrchestratorError,
};

const PRIMARY_TX: B256 = B256::repeat_byte(0xa1);
const RESEND_TX: B256 = B256::repeat_byte(0xa2);
const VALIDATION_ID: B256 = B256::repeat_byte(0x5a);

fn direct_session(chain: Arc<MockChain>) -> ManagerSession {
    let dispatcher: Arc<dyn CallDispatcher> = Arc::new(DirectDispatcher::new(chain));
    ManagerSession::new(MANAGER, CALLER, OwnershipState::OwnedByCaller, Some(dispatcher))
}

fn service(chain: Arc<MockChain>, journal: InMemoryJournal, config: OrchestratorConfig) -> RegistrationService {
    service_with(chain, MockAggregator::new(), MockRoot::new(), journal, config)
}

fn service_with(
    chain: Arc<MockChain>,
    aggregator: MockAggregator,
    root: MockRoot,
    journal: InMemoryJournal,
    config: OrchestratorConfig,
) -> RegistrationService {
    RegistrationService::new(chain, Arc::new(aggregator), Arc::new(root), Arc::new(journal), config)
}

async fn states(journal: &InMemoryJournal) -> Result<Vec<PipelineState>> {
    let operations = journal.operations().await?;
    assert_eq!(operations.len(), 1);
    Ok(journal
        .history(operations[0])
        .await?
        .into_iter()
        .map(|t| t.state)
        .collect())
}

#[tokio::test]
async fn test_register_small_validator_end_to_end() -> Result<()> {
    let mut chain = MockChain::new();
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "initiateValidatorRegistration" && call.target == MANAGER)
        .times(1)
        .returning(|_| Ok(PRIMARY_TX));
    chain
        .expect_wait_for_receipt()
        .withf(|hash| *hash == PRIMARY_TX)
        .times(1)
        .returning(|hash| {
            Ok(receipt(
                hash,
                true,
                vec![registration_log(VALIDATION_ID, 1, 5), warp_log(b"registration message")],
            ))
        });
    let chain = Arc::new(chain);
    let journal = InMemoryJournal::new();
    let service = service(chain.clone(), journal.clone(), config());

    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let outcomes = assert_ok!(service.register(&direct_session(chain), request).await);

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        RegistrationOutcome::Executed(result) => {
            assert_eq!(result.tx_hash, PRIMARY_TX);
            assert_eq!(result.validation_id, VALIDATION_ID);
            assert_eq!(result.validation_id.len(), 32);
            assert_eq!(result.weight, 5);
            assert_eq!(result.balance, 1_000_000_000);
            assert!(!result.unsigned_message.is_empty());
            assert_eq!(result.unsigned_message.as_bytes().as_ref(), b"registration message");
            assert!(!result.resent);
        }
        other => panic!("Expected executed registration, got {:?}", other),
    }

    let states = states(&journal).await?;
    assert_eq!(states.first(), Some(&PipelineState::Validating));
    assert_eq!(states.last(), Some(&PipelineState::Succeeded));
    assert!(states.contains(&PipelineState::AwaitingReceipt { tx_hash: PRIMARY_TX }));

    Ok(())
}

#[tokio::test]
async fn test_reverted_registration_resends_existing_validation() -> Result<()> {
    let mut chain = MockChain::new();
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "initiateValidatorRegistration")
        .times(1)
        .returning(|_| Ok(PRIMARY_TX));
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "resendRegisterValidatorMessage")
        .times(1)
        .returning(|_| Ok(RESEND_TX));
    chain
        .expect_wait_for_receipt()
        .withf(|hash| *hash == PRIMARY_TX)
        .times(1)
        .returning(|hash| Ok(receipt(hash, false, vec![])));
    chain
        .expect_wait_for_receipt()
        .withf(|hash| *hash == RESEND_TX)
        .times(1)
        .returning(|hash| Ok(receipt(hash, true, vec![warp_log(b"resent message")])));
    chain
        .expect_node_validation_id()
        .withf(|manager, node| *manager == MANAGER && node.0 == [1u8; 20])
        .times(1)
        .returning(|_, _| Ok(VALIDATION_ID));
    let chain = Arc::new(chain);
    let journal = InMemoryJournal::new();
    let service = service(chain.clone(), journal.clone(), config());

    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let outcomes = assert_ok!(service.register(&direct_session(chain), request).await);

    match &outcomes[0] {
        RegistrationOutcome::Executed(result) => {
            assert_eq!(result.tx_hash, RESEND_TX);
            assert_eq!(result.validation_id, VALIDATION_ID);
            assert_eq!(result.weight, 5);
            assert!(result.resent);
        }
        other => panic!("Expected executed registration, got {:?}", other),
    }

    let states = states(&journal).await?;
    assert!(states.iter().any(|s| matches!(s, PipelineState::Fallback { .. })));
    assert_eq!(states.last(), Some(&PipelineState::Succeeded));

    Ok(())
}

#[tokio::test]
async fn test_reverted_registration_without_validation_is_fatal() -> Result<()> {
    let mut chain = MockChain::new();
    // A resend would be a second send and fail the expectation.
    chain
        .expect_send_transaction()
        .times(1)
        .returning(|_| Ok(PRIMARY_TX));
    chain
        .expect_wait_for_receipt()
        .times(1)
        .returning(|hash| Ok(receipt(hash, false, vec![])));
    chain
        .expect_node_validation_id()
        .times(1)
        .returning(|_, _| Ok(B256::ZERO));
    let chain = Arc::new(chain);
    let journal = InMemoryJournal::new();
    let service = service(chain.clone(), journal.clone(), config());

    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let err = assert_err!(service.register(&direct_session(chain), request).await);
    assert!(matches!(err, OrchestratorError::NoExistingValidation { .. }));

    let states = states(&journal).await?;
    assert!(matches!(
        states.last(),
        Some(PipelineState::Failed { stage: PipelineStage::Fallback, .. })
    ));

    Ok(())
}

#[tokio::test]
async fn test_send_time_revert_takes_fallback() -> Result<()> {
    let mut chain = MockChain::new();
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "initiateValidatorRegistration")
        .times(1)
        .returning(|_| Err(anyhow!("execution reverted: NodeAlreadyRegistered")));
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "resendRegisterValidatorMessage")
        .times(1)
        .returning(|_| Ok(RESEND_TX));
    chain
        .expect_wait_for_receipt()
        .times(1)
        .returning(|hash| Ok(receipt(hash, true, vec![unrelated_log(0x01), warp_log(b"resent")])));
    chain
        .expect_node_validation_id()
        .times(1)
        .returning(|_, _| Ok(VALIDATION_ID));
    let chain = Arc::new(chain);
    let service = service(chain.clone(), InMemoryJournal::new(), config());

    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let outcomes = assert_ok!(service.register(&direct_session(chain), request).await);
    assert!(matches!(&outcomes[0], RegistrationOutcome::Executed(r) if r.resent));

    Ok(())
}

#[tokio::test]
async fn test_failed_resend_reports_both_errors() -> Result<()> {
    let mut chain = MockChain::new();
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "initiateValidatorRegistration")
        .times(1)
        .returning(|_| Err(anyhow!("execution reverted: NodeAlreadyRegistered")));
    chain
        .expect_send_transaction()
        .withf(|call| call.function_name() == "resendRegisterValidatorMessage")
        .times(1)
        .returning(|_| Err(anyhow!("insufficient funds for gas")));
    chain
        .expect_node_validation_id()
        .times(1)
        .returning(|_, _| Ok(VALIDATION_ID));
    let chain = Arc::new(chain);
    let service = service(chain.clone(), InMemoryJournal::new(), config());

    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let err = assert_err!(service.register(&direct_session(chain), request).await);
    match err {
        OrchestratorError::FallbackFailed { primary, fallback } => {
            assert!(primary.contains("NodeAlreadyRegistered"));
            assert!(fallback.contains("Insufficient funds"));
        }
        other => panic!("Expected compound fallback error, got {:?}", other),
    }

    Ok(())
}

#[tokio::test]
async fn test_contract_owned_manager_gets_proposal() -> Result<()> {
    let multisig = Address::repeat_byte(0x77);
    let mut proposer = MockProposer::new();
    proposer
        .expect_propose()
        .withf(move |owner, call| *owner == multisig && call.function_name() == "initiateValidatorRegistration")
        .times(1)
        .returning(|_, _| Ok("proposal-1".to_string()));
    // No transaction is sent from the caller's account.
    let chain = Arc::new(MockChain::new());
    let journal = InMemoryJournal::new();
    let service = service(chain, journal.clone(), config());

    let dispatcher: Arc<dyn CallDispatcher> = Arc::new(MultisigDispatcher::new(multisig, Arc::new(proposer)));
    let session = ManagerSession::new(
        MANAGER,
        CALLER,
        OwnershipState::ContractOwned { multisig },
        Some(dispatcher),
    );
    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let outcomes = assert_ok!(service.register(&session, request).await);

    match &outcomes[0] {
        RegistrationOutcome::Proposed { proposal_id, .. } => assert_eq!(proposal_id, "proposal-1"),
        other => panic!("Expected proposal, got {:?}", other),
    }
    let states = states(&journal).await?;
    assert!(matches!(states.last(), Some(PipelineState::Proposed { .. })));

    Ok(())
}

#[tokio::test]
async fn test_reverted_proposal_never_resends_from_caller() -> Result<()> {
    let multisig = Address::repeat_byte(0x77);
    let mut proposer = MockProposer::new();
    proposer
        .expect_propose()
        .times(1)
        .returning(|_, _| Err(anyhow!("simulation failed: execution reverted")));
    let mut chain = MockChain::new();
    chain.expect_send_transaction().times(0);
    chain.expect_node_validation_id().times(0);
    let chain = Arc::new(chain);
    let journal = InMemoryJournal::new();
    let service = service(chain, journal.clone(), config());

    let dispatcher: Arc<dyn CallDispatcher> = Arc::new(MultisigDispatcher::new(multisig, Arc::new(proposer)));
    let session = ManagerSession::new(
        MANAGER,
        CALLER,
        OwnershipState::ContractOwned { multisig },
        Some(dispatcher),
    );
    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let err = assert_err!(service.register(&session, request).await);

    assert!(matches!(
        err,
        OrchestratorError::Execution {
            stage: PipelineStage::Submitting,
            error: ExecutionError::Reverted(_),
        }
    ));
    let states = states(&journal).await?;
    assert!(!states.iter().any(|s| matches!(s, PipelineState::Fallback { .. })));
    assert!(matches!(states.last(), Some(PipelineState::Failed { .. })));

    Ok(())
}

#[tokio::test]
async fn test_batch_failure_keeps_completed_registrations() -> Result<()> {
    let second_node = [2u8; 20];
    let mut chain = MockChain::new();
    chain
        .expect_send_transaction()
        .withf(move |call| !call.calldata.windows(20).any(|w| w == second_node.as_slice()))
        .times(1)
        .returning(|_| Ok(PRIMARY_TX));
    chain
        .expect_send_transaction()
        .withf(move |call| call.calldata.windows(20).any(|w| w == second_node.as_slice()))
        .times(1)
        .returning(|_| Err(anyhow!("insufficient funds for gas * price + value")));
    chain
        .expect_wait_for_receipt()
        .withf(|hash| *hash == PRIMARY_TX)
        .times(1)
        .returning(|hash| {
            Ok(receipt(
                hash,
                true,
                vec![registration_log(VALIDATION_ID, 1, 5), warp_log(b"registration message")],
            ))
        });
    let chain = Arc::new(chain);
    let journal = InMemoryJournal::new();
    let service = service(chain.clone(), journal.clone(), config());

    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5), descriptor(2, 5)],
        total_stake: 1000,
    };
    let err = assert_err!(service.register(&direct_session(chain), request).await);

    assert_eq!(err.stage(), PipelineStage::Submitting);
    match err {
        OrchestratorError::BatchInterrupted {
            node_id,
            completed,
            source,
        } => {
            assert_eq!(node_id, descriptor(2, 5).node_id.to_string());
            assert_eq!(completed.len(), 1);
            match &completed[0] {
                RegistrationOutcome::Executed(result) => {
                    assert_eq!(result.tx_hash, PRIMARY_TX);
                    assert_eq!(result.validation_id, VALIDATION_ID);
                }
                other => panic!("Expected executed registration, got {:?}", other),
            }
            assert!(matches!(
                *source,
                OrchestratorError::Execution {
                    error: ExecutionError::InsufficientFunds,
                    ..
                }
            ));
        }
        other => panic!("Expected interrupted batch, got {:?}", other),
    }
    assert_eq!(journal.operations().await?.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_unauthorized_caller_makes_no_network_call() {
    let chain = Arc::new(MockChain::new());
    let service = service(chain, InMemoryJournal::new(), config());

    let session = ManagerSession::new(
        MANAGER,
        CALLER,
        OwnershipState::OwnedByOtherAccount {
            owner: Address::repeat_byte(0x99),
        },
        None,
    );
    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let err = assert_err!(service.register(&session, request).await);
    assert!(matches!(err, OrchestratorError::Unauthorized(_)));

    let unresolved = ManagerSession::unresolved(MANAGER, CALLER);
    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5)],
        total_stake: 1000,
    };
    let err = assert_err!(service.register(&unresolved, request).await);
    assert!(matches!(err, OrchestratorError::OwnershipUnresolved));
}

#[tokio::test]
async fn test_preflight_rejections() {
    let chain = Arc::new(MockChain::new());
    let session = direct_session(chain.clone());
    let service = service(chain, InMemoryJournal::new(), config());

    let empty = RegistrationRequest {
        validators: vec![],
        total_stake: 1000,
    };
    assert!(matches!(service.register(&session, empty).await, Err(OrchestratorError::Validation(_))));

    let too_heavy = RegistrationRequest {
        validators: vec![descriptor(1, 200)],
        total_stake: 1000,
    };
    assert!(matches!(
        service.register(&session, too_heavy).await,
        Err(OrchestratorError::Validation(_))
    ));

    let duplicate = RegistrationRequest {
        validators: vec![descriptor(1, 5), descriptor(1, 6)],
        total_stake: 1000,
    };
    assert!(matches!(
        service.register(&session, duplicate).await,
        Err(OrchestratorError::Validation(_))
    ));
}

#[tokio::test]
async fn test_unknown_total_stake_policy() -> Result<()> {
    let chain = Arc::new(MockChain::new());
    let session = direct_session(chain.clone());

    let mut strict = config();
    strict.require_total_stake = true;
    let strict_service = service(chain.clone(), InMemoryJournal::new(), strict);
    let request = RegistrationRequest {
        validators: vec![descriptor(1, 5_000)],
        total_stake: 0,
    };
    assert!(matches!(
        strict_service.preflight(&session, &request),
        Err(OrchestratorError::Validation(_))
    ));

    let permissive_service = service(chain, InMemoryJournal::new(), config());
    assert!(permissive_service.preflight(&session, &request).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_complete_registration_signs_and_finalizes() -> Result<()> {
    let mut chain = MockChain::new();
    chain
        .expect_wait_for_receipt()
        .withf(|hash| *hash == PRIMARY_TX)
        .times(1)
        .returning(|hash| {
            Ok(receipt(
                hash,
                true,
                vec![registration_log(VALIDATION_ID, 1, 5), warp_log(b"registration message")],
            ))
        });

    let l1 = config().subnet_id;
    let mut aggregator = MockAggregator::new();
    aggregator
        .expect_aggregate()
        .withf(move |message, subnet, quorum| {
            message.as_bytes().as_ref() == b"registration message" && *subnet == l1 && *quorum == 67
        })
        .times(1)
        .returning(|_, _, _| Ok(vec![0xee; 64].into()));

    let mut root = MockRoot::new();
    root.expect_submit()
        .withf(|request| {
            matches!(request, FinalizationRequest::RegisterValidator { balance, .. } if *balance == 25)
        })
        .times(1)
        .returning(|_| Ok("root-tx".to_string()));

    let journal = InMemoryJournal::new();
    let service = service_with(Arc::new(chain), aggregator, root, journal.clone(), config());
    let completed = assert_ok!(
        service
            .complete_registration(CompleteRegistrationRequest {
                tx_hash: PRIMARY_TX,
                balance: 25,
                proof_of_possession: descriptor(1, 5).bls_proof_of_possession,
                signing_subnet_id: None,
                quorum_percentage: None,
            })
            .await
    );

    assert_eq!(completed.validation_id, Some(VALIDATION_ID));
    assert_eq!(completed.finalization.tx_id(), Some("root-tx"));
    let states = states(&journal).await?;
    assert!(states.contains(&PipelineState::Aggregating));
    assert_eq!(states.last(), Some(&PipelineState::Succeeded));

    Ok(())
}

#[tokio::test]
async fn test_complete_registration_already_applied_is_success() -> Result<()> {
    let mut chain = MockChain::new();
    chain
        .expect_wait_for_receipt()
        .returning(|hash| Ok(receipt(hash, true, vec![warp_log(b"registration message")])));
    let mut aggregator = MockAggregator::new();
    aggregator
        .expect_aggregate()
        .times(1)
        .returning(|_, _, _| Ok(vec![0xee; 64].into()));
    let mut root = MockRoot::new();
    root.expect_submit()
        .times(1)
        .returning(|_| Err(anyhow!("validation already registered")));

    let service = service_with(Arc::new(chain), aggregator, root, InMemoryJournal::new(), config());
    let completed = assert_ok!(
        service
            .complete_registration(CompleteRegistrationRequest {
                tx_hash: PRIMARY_TX,
                balance: 25,
                proof_of_possession: descriptor(1, 5).bls_proof_of_possession,
                signing_subnet_id: None,
                quorum_percentage: None,
            })
            .await
    );
    assert_eq!(completed.finalization, Finalization::AlreadyApplied);

    Ok(())
}
