use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::rpc::{http_client, JsonRpcClient};
use crate::models::{message::FinalizationRequest, validator::SubnetId};
use crate::repositories::traits::RootChain;

#[derive(Debug, Deserialize)]
struct CurrentValidator {
    weight: String,
}

#[derive(Debug, Deserialize)]
struct CurrentValidators {
    validators: Vec<CurrentValidator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedTx {
    #[serde(rename = "txID")]
    tx_id: String,
}

/// Root-chain access. Reads go to the platform API; finalizations go to a
/// signer relay that holds the root-chain fee-paying key.
pub struct PlatformClient {
    platform: JsonRpcClient,
    signer: JsonRpcClient,
}

impl PlatformClient {
    pub fn new(
        platform_url: impl Into<String>,
        signer_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = http_client(request_timeout)?;
        Ok(Self {
            platform: JsonRpcClient::new(http.clone(), platform_url),
            signer: JsonRpcClient::new(http, signer_url),
        })
    }
}

#[async_trait]
impl RootChain for PlatformClient {
    async fn submit(&self, request: FinalizationRequest) -> Result<String> {
        let issued: IssuedTx = match &request {
            FinalizationRequest::RegisterValidator {
                signed,
                balance,
                proof_of_possession,
            } => {
                self.signer
                    .call(
                        "platform.registerL1Validator",
                        json!({
                            "signedWarpMessage": signed.signed,
                            "balance": balance.to_string(),
                            "proofOfPossession": proof_of_possession.as_bytes(),
                        }),
                    )
                    .await?
            }
            FinalizationRequest::SetWeight { signed } => {
                self.signer
                    .call(
                        "platform.setL1ValidatorWeight",
                        json!({ "signedWarpMessage": signed.signed }),
                    )
                    .await?
            }
        };

        info!(tx_id = %issued.tx_id, "root-chain transaction issued");
        Ok(issued.tx_id)
    }

    async fn total_stake_weight(&self, subnet_id: SubnetId) -> Result<u64> {
        let current: CurrentValidators = self
            .platform
            .call("platform.getCurrentValidators", json!({ "subnetID": subnet_id.0 }))
            .await?;

        current.validators.iter().try_fold(0u64, |total, v| {
            let weight = v
                .weight
                .parse::<u64>()
                .with_context(|| format!("invalid validator weight '{}'", v.weight))?;
            Ok::<u64, anyhow::Error>(total.saturating_add(weight))
        })
    }
}
