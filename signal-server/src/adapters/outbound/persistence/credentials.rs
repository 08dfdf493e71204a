use anyhow::Result;
use sqlx::Row;

use crate::domain::models::{Secret, TenantCredentials};

use super::SqliteSettingsStore;

impl SqliteSettingsStore {
    pub(super) async fn db_get_credentials(&self, tenant_id: &str) -> Result<Option<TenantCredentials>> {
        let row = sqlx::query(
            "SELECT tenant_id, telegram_api_id, telegram_api_hash, telegram_phone, telegram_session, telegram_connected \
             FROM tenant_credentials WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };
        let session: Option<String> = row.get("telegram_session");
        Ok(Some(TenantCredentials {
            tenant_id: row.get("tenant_id"),
            telegram_api_id: row.get("telegram_api_id"),
            telegram_api_hash: Secret::new(row.get("telegram_api_hash")),
            telegram_phone: row.get("telegram_phone"),
            telegram_session: session.map(Secret::new),
            telegram_connected: row.get::<i64, _>("telegram_connected") != 0,
        }))
    }

    pub(super) async fn db_save_credentials(&self, creds: &TenantCredentials) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenant_credentials \
                (tenant_id, telegram_api_id, telegram_api_hash, telegram_phone, telegram_session, telegram_connected) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(tenant_id) DO UPDATE SET \
                telegram_api_id = excluded.telegram_api_id, \
                telegram_api_hash = excluded.telegram_api_hash, \
                telegram_phone = excluded.telegram_phone, \
                telegram_session = excluded.telegram_session, \
                telegram_connected = excluded.telegram_connected",
        )
        .bind(&creds.tenant_id)
        .bind(creds.telegram_api_id)
        .bind(creds.telegram_api_hash.expose())
        .bind(&creds.telegram_phone)
        .bind(creds.telegram_session.as_ref().map(|s| s.expose().clone()))
        .bind(creds.telegram_connected)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(super) async fn db_set_telegram_connected(&self, tenant_id: &str, connected: bool) -> Result<()> {
        sqlx::query("UPDATE tenant_credentials SET telegram_connected = ? WHERE tenant_id = ?")
            .bind(connected)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
