use alloy_primitives::{Address, B256};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, str::FromStr};

use validator_manager::models::validator::{
    BlsPublicKey, NodeId, PChainOwner, ProofOfPossession, ValidatorDescriptor,
};

/// Root-chain owner as written by operators: bech32 `P-` addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerInput {
    pub threshold: u32,
    pub addresses: Vec<String>,
}

/// One `[[validators]]` entry of a registration file
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorInput {
    pub node_id: String,
    pub bls_public_key: String,
    pub proof_of_possession: String,
    pub weight: u64,
    /// Balance for the root-chain validator fee, in nAVAX
    pub balance: u64,
    pub remaining_balance_owner: OwnerInput,
    pub deactivation_owner: OwnerInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationFile {
    pub validators: Vec<ValidatorInput>,
}

impl ValidatorInput {
    pub fn into_descriptor(self) -> Result<ValidatorDescriptor> {
        let node = self.node_id.clone();
        let context = |e: String| anyhow!("validator {}: {}", node, e);

        Ok(ValidatorDescriptor {
            node_id: NodeId::from_str(&self.node_id).map_err(context)?,
            bls_public_key: BlsPublicKey::from_hex(&self.bls_public_key).map_err(context)?,
            bls_proof_of_possession: ProofOfPossession::from_hex(&self.proof_of_possession)
                .map_err(context)?,
            weight: self.weight,
            balance: self.balance,
            remaining_balance_owner: PChainOwner::from_addresses(
                self.remaining_balance_owner.threshold,
                &self.remaining_balance_owner.addresses,
            )
            .map_err(context)?,
            deactivation_owner: PChainOwner::from_addresses(
                self.deactivation_owner.threshold,
                &self.deactivation_owner.addresses,
            )
            .map_err(context)?,
        })
    }
}

/// Read validator descriptors from a TOML registration file
pub fn load_validators(path: &Path) -> Result<Vec<ValidatorDescriptor>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading registration file {}", path.display()))?;
    let file: RegistrationFile = toml::from_str(&text)
        .with_context(|| format!("parsing registration file {}", path.display()))?;
    file.validators
        .into_iter()
        .map(ValidatorInput::into_descriptor)
        .collect()
}

pub fn parse_b256(value: &str, what: &str) -> Result<B256> {
    B256::from_str(value).map_err(|e| anyhow!("invalid {} {:?}: {}", what, value, e))
}

pub fn parse_address(value: &str, what: &str) -> Result<Address> {
    Address::from_str(value).map_err(|e| anyhow!("invalid {} {:?}: {}", what, value, e))
}
