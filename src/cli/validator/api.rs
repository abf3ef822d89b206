use alloy_primitives::Address;
use anyhow::{anyhow, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use validator_manager::{
    models::validator::SubnetId,
    repositories::{
        http::{EvmRpcClient, HttpMultisigProposer, HttpSignatureAggregator, PlatformClient, ReceiptPolling},
        journal::JsonFileJournal,
        traits::{MultisigProposer, PipelineJournal, RootChain},
    },
    services::{
        ownership_service::{ManagerSession, OwnershipResolver},
        registration_service::RegistrationService,
        removal_service::RemovalService,
    },
    OrchestratorConfig,
};

use crate::{config::Config, types::parse_address};

/// Clients and services wired from the CLI configuration
pub struct OrchestratorApi {
    pub registration: RegistrationService,
    pub removal: RemovalService,
    resolver: OwnershipResolver,
    root_chain: Arc<PlatformClient>,
    orchestrator: OrchestratorConfig,
    manager: Option<Address>,
    caller: Option<Address>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| anyhow!("{} is not configured; set it in config.toml or pass it as a flag", name))
}

impl OrchestratorApi {
    pub fn new(config: &Config) -> Result<Self> {
        let manager = config
            .manager_address
            .as_deref()
            .map(|a| parse_address(a, "manager address"))
            .transpose()?;
        let caller = config
            .caller_address
            .as_deref()
            .map(|a| parse_address(a, "caller address"))
            .transpose()?;
        let subnet_id = SubnetId(required(&config.subnet_id, "subnet_id")?.to_string());

        let polling = ReceiptPolling {
            interval: Duration::from_millis(config.receipt_poll_interval_ms),
            max_attempts: config.receipt_max_attempts,
        };
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let chain = Arc::new(EvmRpcClient::new(
            config.execution_rpc_url.clone(),
            caller.unwrap_or(Address::ZERO),
            polling,
            request_timeout,
        )?);
        let aggregator = Arc::new(HttpSignatureAggregator::new(
            config.aggregator_url.clone(),
            Duration::from_secs(config.aggregation_timeout_secs),
        )?);
        let root_chain = Arc::new(PlatformClient::new(
            config.platform_rpc_url.clone(),
            config.signer_relay_url.clone(),
            request_timeout,
        )?);
        let proposer = match config.proposal_url.clone() {
            Some(url) => Some(
                Arc::new(HttpMultisigProposer::new(url, request_timeout)?) as Arc<dyn MultisigProposer>
            ),
            None => None,
        };

        let journal_path = config
            .journal_path
            .clone()
            .ok_or_else(|| anyhow!("journal_path is not configured"))?;
        let journal: Arc<dyn PipelineJournal> = Arc::new(JsonFileJournal::new(journal_path));

        let orchestrator = OrchestratorConfig {
            subnet_id,
            signing_subnet_id: config.signing_subnet_id.clone().map(SubnetId),
            quorum_percentage: config.quorum_percentage,
            require_total_stake: config.require_total_stake,
        };

        Ok(Self {
            registration: RegistrationService::new(
                chain.clone(),
                aggregator.clone(),
                root_chain.clone(),
                journal.clone(),
                orchestrator.clone(),
            ),
            removal: RemovalService::new(
                chain.clone(),
                aggregator,
                root_chain.clone(),
                journal,
                orchestrator.clone(),
            ),
            resolver: OwnershipResolver::new(chain, proposer),
            root_chain,
            orchestrator,
            manager,
            caller,
        })
    }

    pub fn manager(&self) -> Result<Address> {
        self.manager.ok_or_else(|| anyhow!("manager_address is not configured"))
    }

    pub fn caller(&self) -> Result<Address> {
        self.caller.ok_or_else(|| anyhow!("caller_address is not configured"))
    }

    /// Resolve ownership of the configured manager for the configured caller
    pub async fn session(&self) -> Result<ManagerSession> {
        Ok(self.resolver.open_session(self.manager()?, self.caller()?).await?)
    }

    /// Current total L1 stake, or 0 when it cannot be fetched and the
    /// configuration tolerates that.
    pub async fn total_stake(&self) -> Result<u64> {
        match self
            .root_chain
            .total_stake_weight(self.orchestrator.subnet_id.clone())
            .await
        {
            Ok(total) => {
                info!(subnet = %self.orchestrator.subnet_id, total, "fetched total L1 stake");
                Ok(total)
            }
            Err(e) if !self.orchestrator.require_total_stake => {
                warn!(error = %e, "could not fetch total L1 stake, treating it as unknown");
                Ok(0)
            }
            Err(e) => Err(e.context("fetching total L1 stake")),
        }
    }
}
