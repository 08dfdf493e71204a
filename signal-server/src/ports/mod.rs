pub mod outbound;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{BrokerAccount, BusEvent, PlanTier, Signal, Tenant, TenantCredentials, TenantSettings, Trade};

pub use outbound::{BridgeGateway, LlmClient, TelegramSession};

/// Durable-store facade (C2). All access paths are reentrant-safe; the
/// duplicate check on `find_or_create_signal` requires a row lock or UPSERT
/// at the implementation, not an in-memory lock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>>;
    async fn get_credentials(&self, tenant_id: &str) -> Result<Option<TenantCredentials>>;
    async fn save_credentials(&self, creds: &TenantCredentials) -> Result<()>;
    async fn get_settings(&self, tenant_id: &str) -> Result<Option<TenantSettings>>;
    /// The watchdog's only write path onto the persisted `telegram_connected`
    /// flag; never a trigger to reconnect.
    async fn set_telegram_connected(&self, tenant_id: &str, connected: bool) -> Result<()>;

    async fn get_broker_accounts(&self, tenant_id: &str) -> Result<Vec<BrokerAccount>>;
    async fn get_broker_account(&self, id: &str) -> Result<Option<BrokerAccount>>;
    async fn create_broker_account(&self, account: &BrokerAccount) -> Result<()>;
    /// Deletes the account; if it was primary, promotes another account of
    /// the same tenant to primary, preserving the "exactly one primary" invariant.
    async fn delete_broker_account(&self, id: &str) -> Result<()>;
    async fn set_account_connected(&self, id: &str, connected: bool) -> Result<()>;

    /// Atomically inserts a new Signal row, or returns `Ok(None)` if
    /// `(tenant_id, channel_id, message_id)` already exists.
    async fn find_or_create_signal(
        &self,
        tenant_id: &str,
        channel_id: &str,
        message_id: &str,
        raw_text: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Option<Signal>>;
    async fn get_signal(&self, id: &str) -> Result<Option<Signal>>;
    async fn update_signal(&self, signal: &Signal) -> Result<()>;

    async fn create_trade(&self, trade: &Trade) -> Result<()>;
    async fn get_open_trades(&self, tenant_id: &str, broker_account_id: &str) -> Result<Vec<Trade>>;
    async fn close_trade(&self, id: &str, close_price: f64, profit: f64, closed_at: DateTime<Utc>) -> Result<()>;

    /// Full `channel_id -> tenant_id` rows, used to rebuild the subscription cache.
    async fn all_channel_subscriptions(&self) -> Result<Vec<(String, String)>>;

    /// Atomically increments the tenant's monthly signal counter and reports
    /// whether the tenant remains within `plan_tier`'s cap.
    async fn increment_and_check_signal_limit(&self, tenant_id: &str, plan_tier: PlanTier) -> Result<bool>;
}

/// In-process typed pub/sub (C1). Handlers must not block; emit never fails —
/// a failing subscriber must not prevent delivery to the others.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn emit(&self, event: BusEvent);
}
