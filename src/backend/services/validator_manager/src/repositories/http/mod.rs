//! HTTP implementations of the collaborator traits.

mod rpc;

pub mod aggregator;
pub mod evm;
pub mod platform;
pub mod proposer;

pub use aggregator::HttpSignatureAggregator;
pub use evm::{EvmRpcClient, ReceiptPolling};
pub use platform::PlatformClient;
pub use proposer::HttpMultisigProposer;
