use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Configuration for the validator manager CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// EVM JSON-RPC endpoint of the L1 hosting the validator manager
    pub execution_rpc_url: String,
    /// Root chain (P-Chain) API endpoint
    pub platform_rpc_url: String,
    /// Relay that signs and issues root-chain transactions
    pub signer_relay_url: String,
    /// Signature aggregation service endpoint
    pub aggregator_url: String,
    /// Multisig proposal service, needed only for contract-owned managers
    pub proposal_url: Option<String>,
    pub manager_address: Option<String>,
    /// Account the execution node sends transactions from
    pub caller_address: Option<String>,
    pub subnet_id: Option<String>,
    pub signing_subnet_id: Option<String>,
    pub quorum_percentage: u8,
    pub receipt_poll_interval_ms: u64,
    pub receipt_max_attempts: u32,
    pub aggregation_timeout_secs: u64,
    /// Upper bound on any single request to the chain, root-chain or
    /// proposal endpoints
    pub request_timeout_secs: u64,
    /// Refuse weight changes while total L1 stake cannot be fetched
    pub require_total_stake: bool,
    pub journal_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execution_rpc_url: "http://127.0.0.1:9650/ext/bc/C/rpc".to_string(),
            platform_rpc_url: "http://127.0.0.1:9650/ext/bc/P".to_string(),
            signer_relay_url: "http://127.0.0.1:9660/ext/bc/P/signer".to_string(),
            aggregator_url: "http://127.0.0.1:8080/aggregate-signatures".to_string(),
            proposal_url: None,
            manager_address: None,
            caller_address: None,
            subnet_id: None,
            signing_subnet_id: None,
            quorum_percentage: 67,
            receipt_poll_interval_ms: 2000,
            receipt_max_attempts: 60,
            aggregation_timeout_secs: 120,
            request_timeout_secs: 30,
            require_total_stake: false,
            journal_path: Some(Self::config_dir().join("journal.jsonl")),
        }
    }
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("avalanche-l1")
            .join("validator-manager")
    }

    /// Load configuration from file
    pub fn load() -> Result<Self, io::Error> {
        let config_dir = Self::config_dir();
        let config_path = config_dir.join("config.toml");

        if !config_path.exists() {
            // Create default config if it doesn't exist
            let default_config = Self::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let config_str = fs::read_to_string(&config_path)?;
        let config = toml::from_str::<Config>(&config_str)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), io::Error> {
        self.save_to(&Self::config_dir().join("config.toml"))
    }

    fn save_to(&self, config_path: &Path) -> Result<(), io::Error> {
        if let Some(dir) = config_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(config_path, toml)
    }

    /// Apply global command-line overrides
    pub fn with_overrides(mut self, matches: &clap::ArgMatches<'_>) -> Self {
        if let Some(rpc) = matches.value_of("rpc") {
            self.execution_rpc_url = rpc.to_string();
        }
        if let Some(manager) = matches.value_of("manager") {
            self.manager_address = Some(manager.to_string());
        }
        if let Some(caller) = matches.value_of("caller") {
            self.caller_address = Some(caller.to_string());
        }
        if let Some(subnet) = matches.value_of("subnet") {
            self.subnet_id = Some(subnet.to_string());
        }
        if let Some(journal) = matches.value_of("journal") {
            self.journal_path = Some(PathBuf::from(journal));
        }
        if matches.is_present("require-total-stake") {
            self.require_total_stake = true;
        }
        self
    }
}
