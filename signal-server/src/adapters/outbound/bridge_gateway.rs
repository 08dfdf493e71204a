//! Wraps `copier_bridge_client::BridgeClient` behind the `BridgeGateway`
//! port (C5). The REST client already exposes exactly this surface; the
//! adapter's only job is converting `BridgeError` into `anyhow::Error` at
//! the hexagonal seam.

use anyhow::Result;
use async_trait::async_trait;
use copier_bridge_client::BridgeClient;

use crate::domain::models::{AccountSnapshot, Deal, ExecutionResult, OrderRequest, Position, Quote};
use crate::ports::BridgeGateway;

pub struct HttpBridgeGateway {
    client: BridgeClient,
}

impl HttpBridgeGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: BridgeClient::new(base_url) }
    }
}

#[async_trait]
impl BridgeGateway for HttpBridgeGateway {
    async fn account_snapshot(&self, bridge_account_id: &str) -> Result<AccountSnapshot> {
        Ok(self.client.account_snapshot(bridge_account_id).await?)
    }

    async fn quote(&self, bridge_account_id: &str, symbol: &str) -> Result<Quote> {
        Ok(self.client.quote(bridge_account_id, symbol).await?)
    }

    async fn positions(&self, bridge_account_id: &str) -> Result<Vec<Position>> {
        Ok(self.client.positions(bridge_account_id).await?)
    }

    async fn execute_order(&self, bridge_account_id: &str, order: &OrderRequest) -> Result<ExecutionResult> {
        Ok(self.client.execute_order(bridge_account_id, order).await?)
    }

    async fn close_position(&self, bridge_account_id: &str, position_id: &str) -> Result<()> {
        Ok(self.client.close_position(bridge_account_id, position_id).await?)
    }

    async fn modify_stop(&self, bridge_account_id: &str, position_id: &str, new_stop_loss: f64) -> Result<()> {
        Ok(self.client.modify_stop(bridge_account_id, position_id, new_stop_loss).await?)
    }

    async fn deals_by_position(&self, bridge_account_id: &str, position_id: &str) -> Result<Vec<Deal>> {
        Ok(self.client.deals_by_position(bridge_account_id, position_id).await?)
    }
}
