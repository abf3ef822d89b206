//! Validator manager ABI surface and the calls built from it.

use alloy_primitives::{address, Address, Bytes, B256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::validator::{PChainOwner, ValidatorDescriptor};

/// Cross-chain messaging precompile; every warp message is emitted here.
pub const WARP_PRECOMPILE_ADDRESS: Address = address!("0200000000000000000000000000000000000005");

pub mod abi {
    alloy_sol_types::sol! {
        struct PChainOwner {
            uint32 threshold;
            address[] addresses;
        }

        struct Validator {
            uint8 status;
            bytes nodeID;
            uint64 startingWeight;
            uint64 sentNonce;
            uint64 receivedNonce;
            uint64 weight;
            uint64 startTime;
            uint64 endTime;
        }

        function initiateValidatorRegistration(
            bytes nodeID,
            bytes blsPublicKey,
            PChainOwner remainingBalanceOwner,
            PChainOwner disableOwner,
            uint64 weight
        ) external returns (bytes32);

        function resendRegisterValidatorMessage(bytes32 validationID) external;

        function initiateValidatorRemoval(bytes32 validationID) external;

        function resendValidatorRemovalMessage(bytes32 validationID) external;

        function initiateValidatorWeightUpdate(bytes32 validationID, uint64 newWeight)
            external
            returns (uint64, bytes32);

        function getNodeValidationID(bytes nodeID) external view returns (bytes32);

        function getValidator(bytes32 validationID) external view returns (Validator);

        function owner() external view returns (address);

        function getThreshold() external view returns (uint256);

        event SendWarpMessage(address indexed sourceAddress, bytes32 indexed unsignedMessageID, bytes message);

        event InitiatedValidatorRegistration(
            bytes32 indexed validationID,
            bytes20 indexed nodeID,
            bytes32 registrationMessageID,
            uint64 registrationExpiry,
            uint64 weight
        );

        event InitiatedValidatorRemoval(
            bytes32 indexed validationID,
            bytes32 validatorWeightMessageID,
            uint64 weight,
            uint64 endTime
        );

        event InitiatedValidatorWeightUpdate(
            bytes32 indexed validationID,
            uint64 nonce,
            bytes32 weightUpdateMessageID,
            uint64 weight
        );
    }
}

impl From<&PChainOwner> for abi::PChainOwner {
    fn from(owner: &PChainOwner) -> Self {
        abi::PChainOwner {
            threshold: owner.threshold,
            addresses: owner.addresses.clone(),
        }
    }
}

/// How a mutating call reached the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchMode {
    Direct,
    Proposed,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchMode::Direct => f.write_str("direct"),
            DispatchMode::Proposed => f.write_str("proposed"),
        }
    }
}

/// Result of handing a call to a dispatcher. A proposal is pending external
/// co-signature and has produced no on-chain effect yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchOutcome {
    Executed { tx_hash: B256 },
    Proposed { proposal_id: String },
}

/// An encoded call against a contract, ready to send or to propose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub target: Address,
    /// Solidity signature, e.g. `initiateValidatorRemoval(bytes32)`.
    pub function: String,
    pub calldata: Bytes,
}

impl ContractCall {
    pub fn new<C: SolCall>(target: Address, call: &C) -> Self {
        Self {
            target,
            function: C::SIGNATURE.to_string(),
            calldata: call.abi_encode().into(),
        }
    }

    pub fn initiate_registration(manager: Address, validator: &ValidatorDescriptor) -> Self {
        Self::new(
            manager,
            &abi::initiateValidatorRegistrationCall {
                nodeID: Bytes::copy_from_slice(validator.node_id.as_bytes()),
                blsPublicKey: validator.bls_public_key.as_bytes().clone(),
                remainingBalanceOwner: (&validator.remaining_balance_owner).into(),
                disableOwner: (&validator.deactivation_owner).into(),
                weight: validator.weight,
            },
        )
    }

    pub fn resend_registration(manager: Address, validation_id: B256) -> Self {
        Self::new(
            manager,
            &abi::resendRegisterValidatorMessageCall {
                validationID: validation_id,
            },
        )
    }

    pub fn initiate_removal(manager: Address, validation_id: B256) -> Self {
        Self::new(
            manager,
            &abi::initiateValidatorRemovalCall {
                validationID: validation_id,
            },
        )
    }

    pub fn resend_removal(manager: Address, validation_id: B256) -> Self {
        Self::new(
            manager,
            &abi::resendValidatorRemovalMessageCall {
                validationID: validation_id,
            },
        )
    }

    pub fn initiate_weight_update(manager: Address, validation_id: B256, weight: u64) -> Self {
        Self::new(
            manager,
            &abi::initiateValidatorWeightUpdateCall {
                validationID: validation_id,
                newWeight: weight,
            },
        )
    }

    /// Function name without the argument list.
    pub fn function_name(&self) -> &str {
        self.function
            .split_once('(')
            .map(|(name, _)| name)
            .unwrap_or(&self.function)
    }
}
