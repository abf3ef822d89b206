use alloy_primitives::Bytes;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{message::UnsignedMessage, validator::SubnetId};
use crate::repositories::traits::SignatureAggregator;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest {
    message: String,
    signing_subnet_id: String,
    quorum_percentage: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregateResponse {
    signed_message: String,
}

/// Client for a signature aggregation endpoint. One request per call; the
/// aggregation round happens inside the service.
pub struct HttpSignatureAggregator {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSignatureAggregator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SignatureAggregator for HttpSignatureAggregator {
    async fn aggregate(
        &self,
        message: UnsignedMessage,
        signing_subnet_id: SubnetId,
        quorum_percentage: u8,
    ) -> Result<Bytes> {
        let request = AggregateRequest {
            message: hex::encode(message.as_bytes()),
            signing_subnet_id: signing_subnet_id.0,
            quorum_percentage,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("signature aggregation request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            // The service has no error taxonomy; its text is all we get.
            let body = response.text().await.unwrap_or_default();
            bail!("aggregator returned {}: {}", status, body);
        }

        let body: AggregateResponse = response.json().await?;
        let signed = hex::decode(body.signed_message.trim_start_matches("0x"))
            .context("aggregator returned a non-hex signed message")?;
        Ok(signed.into())
    }
}
