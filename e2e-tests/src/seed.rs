//! Database seeding helpers. These reach past `SettingsStore`'s trait
//! surface with raw `sqlx` inserts for the fields the trait has no writer
//! for (tenant creation, settings), mirroring how the store's own unit
//! tests seed fixtures.

use copier_bridge_client::Platform;
use copier_signal_server::adapters::outbound::SqliteSettingsStore;
use copier_signal_server::domain::models::{BrokerAccount, Secret, Signal, TenantCredentials, TenantSettings};
use copier_signal_server::ports::SettingsStore;
use sqlx::Row;

pub async fn test_store() -> SqliteSettingsStore {
    SqliteSettingsStore::new("sqlite::memory:").await.expect("in-memory store must open")
}

pub async fn seed_tenant(store: &SqliteSettingsStore, tenant_id: &str) {
    sqlx::query("INSERT INTO tenants (id, status, role, plan_tier) VALUES (?, 'active', 'user', 'free')")
        .bind(tenant_id)
        .execute(store.pool())
        .await
        .expect("tenant insert must succeed");
}

pub async fn seed_settings(store: &SqliteSettingsStore, settings: &TenantSettings) {
    let settings_json = serde_json::to_string(settings).expect("settings must serialize");
    sqlx::query("INSERT INTO tenant_settings (tenant_id, settings_json) VALUES (?, ?)")
        .bind(&settings.tenant_id)
        .bind(settings_json)
        .execute(store.pool())
        .await
        .expect("settings insert must succeed");
}

pub async fn seed_credentials(store: &SqliteSettingsStore, tenant_id: &str) {
    let creds = TenantCredentials {
        tenant_id: tenant_id.to_string(),
        telegram_api_id: 1,
        telegram_api_hash: Secret::new("hash".to_string()),
        telegram_phone: "+10000000000".to_string(),
        telegram_session: None,
        telegram_connected: false,
    };
    store.save_credentials(&creds).await.expect("credentials insert must succeed");
}

pub async fn seed_broker_account(store: &SqliteSettingsStore, tenant_id: &str, account_id: &str, bridge_account_id: &str) {
    let account = BrokerAccount {
        id: account_id.to_string(),
        tenant_id: tenant_id.to_string(),
        alias: account_id.to_string(),
        login: "1000".to_string(),
        server: "demo-server".to_string(),
        platform: Platform::Mt5,
        bridge_account_id: Some(bridge_account_id.to_string()),
        is_active: true,
        is_connected: false,
        is_primary: true,
    };
    store.create_broker_account(&account).await.expect("broker account insert must succeed");
}

/// Test-only lookup the `SettingsStore` trait has no direct path for: the
/// router creates the signal row internally, so a scenario test has no id
/// to hand `get_signal` until it goes looking for it by the message it sent.
pub async fn find_signal_by_message(store: &SqliteSettingsStore, channel_id: &str, message_id: &str) -> Option<Signal> {
    let row = sqlx::query("SELECT signal_json FROM signals WHERE channel_id = ? AND message_id = ?")
        .bind(channel_id)
        .bind(message_id)
        .fetch_optional(store.pool())
        .await
        .expect("signal lookup must succeed")?;
    Some(serde_json::from_str(&row.get::<String, _>("signal_json")).expect("signal_json must deserialize"))
}
