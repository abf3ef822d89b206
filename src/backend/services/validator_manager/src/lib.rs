//! Orchestration of validator-set changes on a permissioned L1: drives the
//! validator manager contract, the signature aggregation service and the
//! root chain through registration, removal and re-weighting.

pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;

pub use config::OrchestratorConfig;
pub use utils::errors::{ExecutionError, OrchestratorError, Result};
