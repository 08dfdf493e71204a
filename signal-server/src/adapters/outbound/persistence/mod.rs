//! SQLite-backed `SettingsStore` (C2). Core table management lives here;
//! CRUD operations are split into submodules by aggregate, matching the
//! shape of the domain models they persist.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::domain::models::{BrokerAccount, PlanTier, Signal, Tenant, TenantCredentials, TenantSettings, Trade};
use crate::ports::SettingsStore;

mod broker_accounts;
mod credentials;
mod signals;
mod tenants;
mod trades;

#[cfg(test)]
mod tests;

pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL DEFAULT 'pending',
                role TEXT NOT NULL DEFAULT 'user',
                plan_tier TEXT NOT NULL DEFAULT 'free',
                monthly_signal_count INTEGER NOT NULL DEFAULT 0,
                signal_count_period TEXT NOT NULL DEFAULT '',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_credentials (
                tenant_id TEXT PRIMARY KEY,
                telegram_api_id INTEGER NOT NULL,
                telegram_api_hash TEXT NOT NULL,
                telegram_phone TEXT NOT NULL,
                telegram_session TEXT,
                telegram_connected INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_settings (
                tenant_id TEXT PRIMARY KEY,
                settings_json TEXT NOT NULL DEFAULT '{}',
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS broker_accounts (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                alias TEXT NOT NULL,
                login TEXT NOT NULL,
                server TEXT NOT NULL,
                platform TEXT NOT NULL,
                bridge_account_id TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_connected INTEGER NOT NULL DEFAULT 0,
                is_primary INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (tenant_id) REFERENCES tenants(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                received_at DATETIME NOT NULL,
                signal_json TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'received',
                UNIQUE (tenant_id, channel_id, message_id)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                signal_id TEXT NOT NULL,
                broker_account_id TEXT NOT NULL,
                broker_order_id TEXT NOT NULL,
                trade_json TEXT NOT NULL DEFAULT '{}',
                status TEXT NOT NULL DEFAULT 'open',
                opened_at DATETIME,
                closed_at DATETIME
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_broker_accounts_tenant ON broker_accounts(tenant_id)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_tenant_account ON trades(tenant_id, broker_account_id)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        self.db_get_tenant(tenant_id).await
    }

    async fn get_credentials(&self, tenant_id: &str) -> Result<Option<TenantCredentials>> {
        self.db_get_credentials(tenant_id).await
    }

    async fn save_credentials(&self, creds: &TenantCredentials) -> Result<()> {
        self.db_save_credentials(creds).await
    }

    async fn get_settings(&self, tenant_id: &str) -> Result<Option<TenantSettings>> {
        self.db_get_settings(tenant_id).await
    }

    async fn set_telegram_connected(&self, tenant_id: &str, connected: bool) -> Result<()> {
        self.db_set_telegram_connected(tenant_id, connected).await
    }

    async fn get_broker_accounts(&self, tenant_id: &str) -> Result<Vec<BrokerAccount>> {
        self.db_get_broker_accounts(tenant_id).await
    }

    async fn get_broker_account(&self, id: &str) -> Result<Option<BrokerAccount>> {
        self.db_get_broker_account(id).await
    }

    async fn create_broker_account(&self, account: &BrokerAccount) -> Result<()> {
        self.db_create_broker_account(account).await
    }

    async fn delete_broker_account(&self, id: &str) -> Result<()> {
        self.db_delete_broker_account(id).await
    }

    async fn set_account_connected(&self, id: &str, connected: bool) -> Result<()> {
        self.db_set_account_connected(id, connected).await
    }

    async fn find_or_create_signal(
        &self,
        tenant_id: &str,
        channel_id: &str,
        message_id: &str,
        raw_text: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Option<Signal>> {
        self.db_find_or_create_signal(tenant_id, channel_id, message_id, raw_text, received_at).await
    }

    async fn get_signal(&self, id: &str) -> Result<Option<Signal>> {
        self.db_get_signal(id).await
    }

    async fn update_signal(&self, signal: &Signal) -> Result<()> {
        self.db_update_signal(signal).await
    }

    async fn create_trade(&self, trade: &Trade) -> Result<()> {
        self.db_create_trade(trade).await
    }

    async fn get_open_trades(&self, tenant_id: &str, broker_account_id: &str) -> Result<Vec<Trade>> {
        self.db_get_open_trades(tenant_id, broker_account_id).await
    }

    async fn close_trade(&self, id: &str, close_price: f64, profit: f64, closed_at: DateTime<Utc>) -> Result<()> {
        self.db_close_trade(id, close_price, profit, closed_at).await
    }

    async fn all_channel_subscriptions(&self) -> Result<Vec<(String, String)>> {
        self.db_all_channel_subscriptions().await
    }

    async fn increment_and_check_signal_limit(&self, tenant_id: &str, plan_tier: PlanTier) -> Result<bool> {
        self.db_increment_and_check_signal_limit(tenant_id, plan_tier).await
    }
}
