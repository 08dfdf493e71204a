use chrono::Utc;

use crate::domain::models::{BrokerAccount, PlanTier, TenantCredentials, TenantSettings};
use crate::ports::SettingsStore;

use super::SqliteSettingsStore;

async fn test_store() -> SqliteSettingsStore {
    SqliteSettingsStore::new("sqlite::memory:").await.unwrap()
}

async fn seed_tenant(store: &SqliteSettingsStore, tenant_id: &str) {
    sqlx::query("INSERT INTO tenants (id, status, role, plan_tier) VALUES (?, 'active', 'user', 'free')")
        .bind(tenant_id)
        .execute(store.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn find_or_create_signal_is_idempotent_on_the_same_message() {
    let store = test_store().await;
    seed_tenant(&store, "tenant-1").await;

    let first = store.find_or_create_signal("tenant-1", "chan-1", "msg-1", "buy gold", Utc::now()).await.unwrap();
    assert!(first.is_some());

    let second = store.find_or_create_signal("tenant-1", "chan-1", "msg-1", "buy gold", Utc::now()).await.unwrap();
    assert!(second.is_none(), "duplicate (tenant, channel, message) must not create a second row");
}

#[tokio::test]
async fn signal_updates_round_trip_through_json_storage() {
    let store = test_store().await;
    seed_tenant(&store, "tenant-1").await;
    let mut signal = store
        .find_or_create_signal("tenant-1", "chan-1", "msg-1", "buy gold", Utc::now())
        .await
        .unwrap()
        .unwrap();

    signal.symbol = Some("XAUUSD".to_string());
    signal.chosen_lot = Some(0.05);
    store.update_signal(&signal).await.unwrap();

    let reloaded = store.get_signal(&signal.id).await.unwrap().unwrap();
    assert_eq!(reloaded.symbol.as_deref(), Some("XAUUSD"));
    assert_eq!(reloaded.chosen_lot, Some(0.05));
}

#[tokio::test]
async fn deleting_the_primary_broker_account_promotes_another() {
    let store = test_store().await;
    seed_tenant(&store, "tenant-1").await;

    let primary = BrokerAccount {
        id: "acct-primary".to_string(),
        tenant_id: "tenant-1".to_string(),
        alias: "a-primary".to_string(),
        login: "1".to_string(),
        server: "broker".to_string(),
        platform: copier_bridge_client::Platform::Mt5,
        bridge_account_id: Some("bridge-1".to_string()),
        is_active: true,
        is_connected: false,
        is_primary: true,
    };
    let secondary = BrokerAccount { id: "acct-secondary".to_string(), alias: "b-secondary".to_string(), is_primary: false, ..primary.clone() };

    store.create_broker_account(&primary).await.unwrap();
    store.create_broker_account(&secondary).await.unwrap();
    store.delete_broker_account(&primary.id).await.unwrap();

    let remaining = store.get_broker_account(&secondary.id).await.unwrap().unwrap();
    assert!(remaining.is_primary, "the only remaining account must become primary");
}

#[tokio::test]
async fn credentials_round_trip_and_update_the_connected_flag() {
    let store = test_store().await;
    seed_tenant(&store, "tenant-1").await;

    let creds = TenantCredentials {
        tenant_id: "tenant-1".to_string(),
        telegram_api_id: 123,
        telegram_api_hash: crate::domain::models::Secret::new("hash".to_string()),
        telegram_phone: "+10000000000".to_string(),
        telegram_session: None,
        telegram_connected: false,
    };
    store.save_credentials(&creds).await.unwrap();
    store.set_telegram_connected("tenant-1", true).await.unwrap();

    let reloaded = store.get_credentials("tenant-1").await.unwrap().unwrap();
    assert!(reloaded.telegram_connected);
    assert_eq!(reloaded.telegram_api_id, 123);
}

#[tokio::test]
async fn signal_limit_resets_when_the_counting_period_rolls_over() {
    let store = test_store().await;
    seed_tenant(&store, "tenant-1").await;

    for _ in 0..3 {
        store.increment_and_check_signal_limit("tenant-1", PlanTier::Free).await.unwrap();
    }
    sqlx::query("UPDATE tenants SET signal_count_period = '2000-01' WHERE id = 'tenant-1'")
        .execute(store.pool())
        .await
        .unwrap();

    let within_limit = store.increment_and_check_signal_limit("tenant-1", PlanTier::Free).await.unwrap();
    assert!(within_limit);
    let row: (i64,) = sqlx::query_as("SELECT monthly_signal_count FROM tenants WHERE id = 'tenant-1'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(row.0, 1, "a stale period must reset the counter before incrementing");
}

#[tokio::test]
async fn settings_round_trip_preserves_the_channel_subscription_set() {
    let store = test_store().await;
    seed_tenant(&store, "tenant-1").await;

    let mut settings = TenantSettings { tenant_id: "tenant-1".to_string(), ..Default::default() };
    settings.telegram_channel_ids.insert("chan-1".to_string());
    let settings_json = serde_json::to_string(&settings).unwrap();
    sqlx::query("INSERT INTO tenant_settings (tenant_id, settings_json) VALUES (?, ?)")
        .bind("tenant-1")
        .bind(settings_json)
        .execute(store.pool())
        .await
        .unwrap();

    let subscriptions = store.all_channel_subscriptions().await.unwrap();
    assert_eq!(subscriptions, vec![("chan-1".to_string(), "tenant-1".to_string())]);
}
