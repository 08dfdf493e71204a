use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::domain::models::Signal;

use super::SqliteSettingsStore;

impl SqliteSettingsStore {
    /// Relies on the `(tenant_id, channel_id, message_id)` UNIQUE constraint:
    /// a duplicate insert fails with a constraint violation rather than
    /// racing a separate existence check, so concurrent deliveries of the
    /// same message from the shared ingress never create two rows.
    pub(super) async fn db_find_or_create_signal(
        &self,
        tenant_id: &str,
        channel_id: &str,
        message_id: &str,
        raw_text: &str,
        received_at: DateTime<Utc>,
    ) -> Result<Option<Signal>> {
        let signal = Signal {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
            raw_text: raw_text.to_string(),
            received_at,
            symbol: None,
            direction: None,
            entry: None,
            stop_loss: None,
            take_profits: Vec::new(),
            confidence: None,
            warnings: Vec::new(),
            status: crate::domain::models::SignalStatus::Received,
            failure_reason: None,
            parsed_at: None,
            executed_at: None,
            chosen_lot: None,
        };
        let signal_json = serde_json::to_string(&signal)?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO signals \
                (id, tenant_id, channel_id, message_id, raw_text, received_at, signal_json, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&signal.id)
        .bind(tenant_id)
        .bind(channel_id)
        .bind(message_id)
        .bind(raw_text)
        .bind(received_at)
        .bind(&signal_json)
        .bind("received")
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(signal))
    }

    pub(super) async fn db_get_signal(&self, id: &str) -> Result<Option<Signal>> {
        let row = sqlx::query("SELECT signal_json FROM signals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(serde_json::from_str(&row.get::<String, _>("signal_json"))?))
    }

    pub(super) async fn db_update_signal(&self, signal: &Signal) -> Result<()> {
        let signal_json = serde_json::to_string(signal)?;
        let status = serde_json::to_string(&signal.status)?.trim_matches('"').to_string();
        sqlx::query("UPDATE signals SET signal_json = ?, status = ? WHERE id = ?")
            .bind(signal_json)
            .bind(status)
            .bind(&signal.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
