use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::models::Trade;

use super::SqliteSettingsStore;

impl SqliteSettingsStore {
    pub(super) async fn db_create_trade(&self, trade: &Trade) -> Result<()> {
        let trade_json = serde_json::to_string(trade)?;
        let status = serde_json::to_string(&trade.status)?.trim_matches('"').to_string();
        sqlx::query(
            "INSERT INTO trades \
                (id, tenant_id, signal_id, broker_account_id, broker_order_id, trade_json, status, opened_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.id)
        .bind(&trade.tenant_id)
        .bind(&trade.signal_id)
        .bind(&trade.broker_account_id)
        .bind(&trade.broker_order_id)
        .bind(trade_json)
        .bind(status)
        .bind(trade.opened_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(super) async fn db_get_open_trades(&self, tenant_id: &str, broker_account_id: &str) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            "SELECT trade_json FROM trades WHERE tenant_id = ? AND broker_account_id = ? AND status = 'open'",
        )
        .bind(tenant_id)
        .bind(broker_account_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok(serde_json::from_str(&row.get::<String, _>("trade_json"))?))
            .collect()
    }

    pub(super) async fn db_close_trade(
        &self,
        id: &str,
        close_price: f64,
        profit: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<()> {
        let row = sqlx::query("SELECT trade_json FROM trades WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(()) };
        let mut trade: Trade = serde_json::from_str(&row.get::<String, _>("trade_json"))?;
        trade.status = crate::domain::models::TradeStatus::Closed;
        trade.close_price = Some(close_price);
        trade.profit = Some(profit);
        trade.closed_at = Some(closed_at);
        let trade_json = serde_json::to_string(&trade)?;

        sqlx::query("UPDATE trades SET trade_json = ?, status = 'closed', closed_at = ? WHERE id = ?")
            .bind(trade_json)
            .bind(closed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
