use alloy_primitives::Address;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::rpc::http_client;
use crate::models::contract::ContractCall;
use crate::repositories::traits::MultisigProposer;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposalRequest<'a> {
    multisig: Address,
    to: Address,
    function_name: &'a str,
    data: &'a alloy_primitives::Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProposalResponse {
    proposal_id: String,
}

/// Posts calls to a multisig transaction service for co-signing.
pub struct HttpMultisigProposer {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpMultisigProposer {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(request_timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl MultisigProposer for HttpMultisigProposer {
    async fn propose(&self, multisig: Address, call: ContractCall) -> Result<String> {
        let request = ProposalRequest {
            multisig,
            to: call.target,
            function_name: &call.function,
            data: &call.calldata,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("proposal request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("proposal service returned {}: {}", status, body);
        }

        let body: ProposalResponse = response.json().await?;
        Ok(body.proposal_id)
    }
}
