use anyhow::Result;
use async_trait::async_trait;

use crate::domain::models::{AccountSnapshot, Deal, ExecutionResult, OrderRequest, ParseOutcome, Position, Quote, TenantCredentials};

/// Account-level operations an `AccountExecutor` needs from the broker bridge (C5).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BridgeGateway: Send + Sync {
    async fn account_snapshot(&self, bridge_account_id: &str) -> Result<AccountSnapshot>;
    async fn quote(&self, bridge_account_id: &str, symbol: &str) -> Result<Quote>;
    async fn positions(&self, bridge_account_id: &str) -> Result<Vec<Position>>;
    async fn execute_order(&self, bridge_account_id: &str, order: &OrderRequest) -> Result<ExecutionResult>;
    async fn close_position(&self, bridge_account_id: &str, position_id: &str) -> Result<()>;
    async fn modify_stop(&self, bridge_account_id: &str, position_id: &str, new_stop_loss: f64) -> Result<()>;
    async fn deals_by_position(&self, bridge_account_id: &str, position_id: &str) -> Result<Vec<Deal>>;
}

/// Turns a raw message into a tagged `ParseOutcome` (C3). Retries and
/// JSON-repair are the adapter's responsibility; by contract this call never
/// raises — permanent failure surfaces as `ParseOutcome::Rejected`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn parse(&self, raw_text: &str) -> ParseOutcome;
}

/// One tenant's Telegram session (owned by the connection supervisor, C6) or,
/// in shared-ingress mode, the process-wide listener (C9).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelegramSession: Send + Sync {
    async fn connect(&self, credentials: &TenantCredentials, channel_ids: &[String]) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn is_connected(&self) -> bool;
}
