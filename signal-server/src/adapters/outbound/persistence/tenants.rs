use anyhow::Result;
use chrono::Utc;
use sqlx::Row;

use crate::domain::models::{PlanTier, Tenant, TenantRole, TenantSettings, TenantStatus};

use super::SqliteSettingsStore;

impl SqliteSettingsStore {
    pub(super) async fn db_get_tenant(&self, tenant_id: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query("SELECT id, status, role, plan_tier FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(Tenant {
            id: row.get("id"),
            status: parse_status(&row.get::<String, _>("status")),
            role: parse_role(&row.get::<String, _>("role")),
            plan_tier: parse_plan_tier(&row.get::<String, _>("plan_tier")),
        }))
    }

    pub(super) async fn db_get_settings(&self, tenant_id: &str) -> Result<Option<TenantSettings>> {
        let row = sqlx::query("SELECT settings_json FROM tenant_settings WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let mut settings: TenantSettings = serde_json::from_str(&row.get::<String, _>("settings_json"))?;
        settings.tenant_id = tenant_id.to_string();
        Ok(Some(settings))
    }

    pub(super) async fn db_all_channel_subscriptions(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT tenant_id, settings_json FROM tenant_settings")
            .fetch_all(&self.pool)
            .await?;
        let mut subscriptions = Vec::new();
        for row in rows {
            let tenant_id: String = row.get("tenant_id");
            let settings: TenantSettings = serde_json::from_str(&row.get::<String, _>("settings_json"))?;
            for channel_id in settings.telegram_channel_ids {
                subscriptions.push((channel_id, tenant_id.clone()));
            }
        }
        Ok(subscriptions)
    }

    /// Resets the counter when `signal_count_period` (the `YYYY-MM` the
    /// counter was last touched in) has rolled over, then increments and
    /// compares against the tier's monthly cap in the same statement.
    pub(super) async fn db_increment_and_check_signal_limit(
        &self,
        tenant_id: &str,
        plan_tier: PlanTier,
    ) -> Result<bool> {
        let current_period = Utc::now().format("%Y-%m").to_string();
        let row = sqlx::query("SELECT monthly_signal_count, signal_count_period FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(false) };
        let stored_period: String = row.get("signal_count_period");
        let count: i64 = if stored_period == current_period { row.get("monthly_signal_count") } else { 0 };
        let next_count = count + 1;

        sqlx::query(
            "UPDATE tenants SET monthly_signal_count = ?, signal_count_period = ? WHERE id = ?",
        )
        .bind(next_count)
        .bind(&current_period)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(match plan_tier.monthly_signal_limit() {
            Some(limit) => next_count <= limit as i64,
            None => true,
        })
    }
}

fn parse_status(raw: &str) -> TenantStatus {
    match raw {
        "onboarding" => TenantStatus::Onboarding,
        "active" => TenantStatus::Active,
        "suspended" => TenantStatus::Suspended,
        _ => TenantStatus::Pending,
    }
}

fn parse_role(raw: &str) -> TenantRole {
    match raw {
        "admin" => TenantRole::Admin,
        _ => TenantRole::User,
    }
}

fn parse_plan_tier(raw: &str) -> PlanTier {
    match raw {
        "pro" => PlanTier::Pro,
        "unlimited" => PlanTier::Unlimited,
        _ => PlanTier::Free,
    }
}
