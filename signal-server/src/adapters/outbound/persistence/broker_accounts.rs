use anyhow::Result;
use copier_bridge_client::Platform;
use sqlx::Row;

use crate::domain::models::BrokerAccount;

use super::SqliteSettingsStore;

impl SqliteSettingsStore {
    pub(super) async fn db_get_broker_accounts(&self, tenant_id: &str) -> Result<Vec<BrokerAccount>> {
        let rows = sqlx::query("SELECT * FROM broker_accounts WHERE tenant_id = ? ORDER BY is_primary DESC, alias")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_account).collect()
    }

    pub(super) async fn db_get_broker_account(&self, id: &str) -> Result<Option<BrokerAccount>> {
        let row = sqlx::query("SELECT * FROM broker_accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    pub(super) async fn db_create_broker_account(&self, account: &BrokerAccount) -> Result<()> {
        sqlx::query(
            "INSERT INTO broker_accounts \
                (id, tenant_id, alias, login, server, platform, bridge_account_id, is_active, is_connected, is_primary) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.tenant_id)
        .bind(&account.alias)
        .bind(&account.login)
        .bind(&account.server)
        .bind(platform_to_str(account.platform))
        .bind(&account.bridge_account_id)
        .bind(account.is_active)
        .bind(account.is_connected)
        .bind(account.is_primary)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes the row; if it was primary, promotes the next account of the
    /// same tenant (by alias) so exactly one primary always remains, unless
    /// the tenant now has zero accounts.
    pub(super) async fn db_delete_broker_account(&self, id: &str) -> Result<()> {
        let Some(account) = self.db_get_broker_account(id).await? else { return Ok(()) };
        sqlx::query("DELETE FROM broker_accounts WHERE id = ?").bind(id).execute(&self.pool).await?;

        if account.is_primary {
            let next = sqlx::query(
                "SELECT id FROM broker_accounts WHERE tenant_id = ? ORDER BY alias LIMIT 1",
            )
            .bind(&account.tenant_id)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(next) = next {
                let next_id: String = next.get("id");
                sqlx::query("UPDATE broker_accounts SET is_primary = 1 WHERE id = ?")
                    .bind(next_id)
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub(super) async fn db_set_account_connected(&self, id: &str, connected: bool) -> Result<()> {
        sqlx::query("UPDATE broker_accounts SET is_connected = ? WHERE id = ?")
            .bind(connected)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<BrokerAccount> {
    Ok(BrokerAccount {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        alias: row.get("alias"),
        login: row.get("login"),
        server: row.get("server"),
        platform: platform_from_str(&row.get::<String, _>("platform")),
        bridge_account_id: row.get("bridge_account_id"),
        is_active: row.get::<i64, _>("is_active") != 0,
        is_connected: row.get::<i64, _>("is_connected") != 0,
        is_primary: row.get::<i64, _>("is_primary") != 0,
    })
}

fn platform_to_str(platform: Platform) -> &'static str {
    match platform {
        Platform::Mt4 => "mt4",
        Platform::Mt5 => "mt5",
    }
}

fn platform_from_str(raw: &str) -> Platform {
    match raw {
        "mt4" => Platform::Mt4,
        _ => Platform::Mt5,
    }
}
