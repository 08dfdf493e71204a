use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::errors::{BridgeError, BridgeErrorCode};
use crate::types::{
    AccountSnapshot, Deal, ExecutionResult, OrderRequest, Position, ProvisionRequest,
    ProvisionStatus, Quote,
};

const PROVISION_POLL_INTERVAL: Duration = Duration::from_secs(6);
const PROVISION_MAX_ATTEMPTS: u32 = 10;
const ACCOUNT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const PROVISION_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    code: BridgeErrorCode,
    message: String,
    #[serde(default)]
    candidates: Vec<String>,
}

/// Thin REST client for the cloud broker-bridge. One client is shared across
/// all account executors; each call is independently timed out.
#[derive(Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let envelope: ErrorEnvelope = resp
            .json()
            .await
            .map_err(|e| BridgeError::Protocol(e.to_string()))?;
        Err(BridgeError::Rejected {
            code: envelope.code,
            message: envelope.message,
            candidates: envelope.candidates,
        })
    }

    /// Kicks off async provisioning (202 Accepted) and polls until the bridge
    /// reports `Ready` or `Failed`, per the contract in the external-interfaces
    /// section: ≤ 10 attempts, 6 s apart.
    pub async fn provision_account(&self, req: &ProvisionRequest) -> Result<String, BridgeError> {
        let resp = self
            .http
            .post(format!("{}/accounts", self.base_url))
            .timeout(PROVISION_REQUEST_TIMEOUT)
            .json(req)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let location: String = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("job_id").and_then(|j| j.as_str().map(str::to_owned)))
            .ok_or_else(|| BridgeError::Protocol("missing job_id in provisioning response".into()))?;

        for attempt in 0..PROVISION_MAX_ATTEMPTS {
            tokio::time::sleep(PROVISION_POLL_INTERVAL).await;
            let resp = self
                .http
                .get(format!("{}/accounts/jobs/{}", self.base_url, location))
                .send()
                .await?;
            let resp = Self::check(resp).await?;
            let status: ProvisionStatus = resp.json().await.map_err(|e| BridgeError::Protocol(e.to_string()))?;
            match status {
                ProvisionStatus::Ready { bridge_account_id } => return Ok(bridge_account_id),
                ProvisionStatus::Failed { code, message, candidates } => {
                    return Err(BridgeError::Rejected { code, message, candidates })
                }
                ProvisionStatus::Pending => {
                    tracing::debug!(attempt, "account provisioning still pending");
                }
            }
        }
        Err(BridgeError::ProvisioningTimedOut { attempts: PROVISION_MAX_ATTEMPTS })
    }

    pub async fn account_snapshot(&self, bridge_account_id: &str) -> Result<AccountSnapshot, BridgeError> {
        let resp = self
            .http
            .get(format!("{}/accounts/{}/snapshot", self.base_url, bridge_account_id))
            .timeout(ACCOUNT_QUERY_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn quote(&self, bridge_account_id: &str, symbol: &str) -> Result<Quote, BridgeError> {
        let resp = self
            .http
            .get(format!("{}/accounts/{}/quotes/{}", self.base_url, bridge_account_id, symbol))
            .timeout(ACCOUNT_QUERY_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn positions(&self, bridge_account_id: &str) -> Result<Vec<Position>, BridgeError> {
        let resp = self
            .http
            .get(format!("{}/accounts/{}/positions", self.base_url, bridge_account_id))
            .timeout(ACCOUNT_QUERY_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn execute_order(
        &self,
        bridge_account_id: &str,
        order: &OrderRequest,
    ) -> Result<ExecutionResult, BridgeError> {
        let resp = self
            .http
            .post(format!("{}/accounts/{}/orders", self.base_url, bridge_account_id))
            .json(order)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn close_position(&self, bridge_account_id: &str, position_id: &str) -> Result<(), BridgeError> {
        let resp = self
            .http
            .post(format!(
                "{}/accounts/{}/positions/{}/close",
                self.base_url, bridge_account_id, position_id
            ))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn modify_stop(
        &self,
        bridge_account_id: &str,
        position_id: &str,
        new_stop_loss: f64,
    ) -> Result<(), BridgeError> {
        let resp = self
            .http
            .patch(format!(
                "{}/accounts/{}/positions/{}",
                self.base_url, bridge_account_id, position_id
            ))
            .json(&json!({ "stop_loss": new_stop_loss }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn deals_by_position(
        &self,
        bridge_account_id: &str,
        position_id: &str,
    ) -> Result<Vec<Deal>, BridgeError> {
        let resp = self
            .http
            .get(format!(
                "{}/accounts/{}/positions/{}/deals",
                self.base_url, bridge_account_id, position_id
            ))
            .timeout(ACCOUNT_QUERY_TIMEOUT)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}
