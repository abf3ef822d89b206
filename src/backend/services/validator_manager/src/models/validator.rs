use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::encoding::{self, NODE_ID_LEN};

pub const BLS_PUBLIC_KEY_LEN: usize = 48;
pub const BLS_PROOF_OF_POSSESSION_LEN: usize = 96;

/// Root-chain node identifier (20 bytes, rendered as `NodeID-<cb58>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

impl NodeId {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        encoding::parse_node_id(s).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encoding::format_node_id(&self.0))
    }
}

/// Subnet identifier as understood by the root chain (cb58 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubnetId(pub String);

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlsPublicKey(Bytes);

impl BlsPublicKey {
    pub fn from_hex(value: &str) -> Result<Self, String> {
        encoding::decode_hex_exact(value, BLS_PUBLIC_KEY_LEN, "BLS public key")
            .map(|b| Self(b.into()))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOfPossession(Bytes);

impl ProofOfPossession {
    pub fn from_hex(value: &str) -> Result<Self, String> {
        encoding::decode_hex_exact(value, BLS_PROOF_OF_POSSESSION_LEN, "BLS proof of possession")
            .map(|b| Self(b.into()))
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

/// Threshold owner on the root chain (remaining balance or deactivation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PChainOwner {
    pub threshold: u32,
    pub addresses: Vec<Address>,
}

impl PChainOwner {
    /// Build from bech32 root-chain addresses in the given order.
    pub fn from_addresses(threshold: u32, addresses: &[String]) -> Result<Self, String> {
        let addresses = addresses
            .iter()
            .map(|a| encoding::parse_root_chain_address(a))
            .collect::<Result<Vec<_>, _>>()?;
        let owner = Self {
            threshold,
            addresses,
        };
        owner.validate()?;
        Ok(owner)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.addresses.is_empty() {
            return Err("owner must list at least one address".to_string());
        }
        if self.threshold == 0 || self.threshold as usize > self.addresses.len() {
            return Err(format!(
                "owner threshold {} must be between 1 and {}",
                self.threshold,
                self.addresses.len()
            ));
        }
        Ok(())
    }
}

/// Everything the operator submits to register one validator. Not mutated
/// after submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    pub node_id: NodeId,
    pub bls_public_key: BlsPublicKey,
    pub bls_proof_of_possession: ProofOfPossession,
    /// Requested weight in chain-native units.
    pub weight: u64,
    /// Balance declared for the root-chain validator fee, in nAVAX.
    pub balance: u64,
    pub remaining_balance_owner: PChainOwner,
    pub deactivation_owner: PChainOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationStatus {
    PendingRegistration,
    Active,
    PendingRemoval,
    Removed,
}

impl ValidationStatus {
    /// Map the manager contract's status enum. `0` means no record.
    pub fn from_contract(status: u8) -> Option<Self> {
        match status {
            1 => Some(ValidationStatus::PendingRegistration),
            2 => Some(ValidationStatus::Active),
            3 => Some(ValidationStatus::PendingRemoval),
            4 | 5 => Some(ValidationStatus::Removed),
            _ => None,
        }
    }
}

/// Chain-assigned registration record, discovered but never created here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub validation_id: B256,
    pub weight: u64,
    pub end_time: u64,
    pub status: ValidationStatus,
}
