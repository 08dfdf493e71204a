//! Full pipeline scenarios: a seeded tenant receives an inbound message and
//! the signal lands in the status the stage machine promises, against real
//! application-layer code and hand-rolled fakes for the outbound ports.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use copier_bridge_client::{Direction, Quote};
use copier_signal_server::application::{ConnectionManager, InProcessEventBus, InboundMessage, SignalRouter};
use copier_signal_server::config::RouterConfig;
use copier_signal_server::domain::models::{ParseOutcome, SignalStatus, TenantSettings};
use copier_signal_server::ports::{BridgeGateway, EventBus, SettingsStore, TelegramSession};

use e2e_tests::{find_signal_by_message, seed_broker_account, seed_credentials, seed_settings, seed_tenant, test_store, FakeBridgeGateway, FakeLlmClient};

fn router_config() -> RouterConfig {
    RouterConfig::default()
}

#[tokio::test]
async fn an_auto_accepted_open_signal_is_executed_with_a_chosen_lot() {
    e2e_tests::init_tracing();
    let store = Arc::new(test_store().await);
    seed_tenant(&store, "tenant-1").await;
    seed_credentials(&store, "tenant-1").await;
    seed_broker_account(&store, "tenant-1", "acct-1", "bridge-1").await;
    seed_settings(
        &store,
        &TenantSettings {
            tenant_id: "tenant-1".to_string(),
            auto_accept_symbols: ["EURUSD".to_string()].into_iter().collect(),
            telegram_channel_ids: ["chan-1".to_string()].into_iter().collect(),
            ..TenantSettings::default()
        },
    )
    .await;

    let store_dyn: Arc<dyn SettingsStore> = store.clone();
    let bridge = Arc::new(FakeBridgeGateway::new(10_000.0, Quote { bid: 1.0999, ask: 1.1001 }));
    let bridge_dyn: Arc<dyn BridgeGateway> = bridge.clone();
    let telegram: Arc<dyn TelegramSession> = e2e_tests::fakes::shared_telegram();

    let connections = ConnectionManager::new(store_dyn.clone(), bridge_dyn, telegram, Duration::from_secs(30), Duration::from_secs(30));
    connections.connect_user("tenant-1").await.expect("connect_user must succeed against reachable fakes");

    let llm = Arc::new(FakeLlmClient::new(ParseOutcome::Open {
        direction: Direction::Buy,
        symbol: "EURUSD".to_string(),
        entry: 1.1000,
        stop_loss: 1.0950,
        take_profits: vec![1.1050],
        confidence: 0.9,
        warnings: vec![],
        original_direction: None,
    }));
    let events: Arc<dyn EventBus> = Arc::new(InProcessEventBus::new());
    let router = SignalRouter::new(store_dyn, llm, events, connections, &router_config());

    let message = InboundMessage {
        text: "BUY EURUSD entry 1.1000 SL 1.0950 TP 1.1050".to_string(),
        channel_id: "chan-1".to_string(),
        channel_name: "Signals".to_string(),
        message_id: "msg-1".to_string(),
        timestamp: Utc::now(),
        tenant_id: Some("tenant-1".to_string()),
    };
    router.route_message(message).await.expect("routing must not error");

    let signal = find_signal_by_message(&store, "chan-1", "msg-1").await.expect("signal row must exist");
    assert_eq!(signal.status, SignalStatus::Executed);
    assert!(signal.chosen_lot.unwrap_or(0.0) > 0.0);
    assert_eq!(bridge.order_count().await, 1);
}

#[tokio::test]
async fn a_symbol_outside_the_auto_accept_list_waits_for_confirmation() {
    e2e_tests::init_tracing();
    let store = Arc::new(test_store().await);
    seed_tenant(&store, "tenant-1").await;
    seed_credentials(&store, "tenant-1").await;
    seed_broker_account(&store, "tenant-1", "acct-1", "bridge-1").await;
    seed_settings(
        &store,
        &TenantSettings { tenant_id: "tenant-1".to_string(), telegram_channel_ids: ["chan-1".to_string()].into_iter().collect(), ..TenantSettings::default() },
    )
    .await;

    let store_dyn: Arc<dyn SettingsStore> = store.clone();
    let bridge: Arc<dyn BridgeGateway> = Arc::new(FakeBridgeGateway::new(10_000.0, Quote { bid: 1.0999, ask: 1.1001 }));
    let telegram: Arc<dyn TelegramSession> = e2e_tests::fakes::shared_telegram();

    let connections = ConnectionManager::new(store_dyn.clone(), bridge, telegram, Duration::from_secs(30), Duration::from_secs(30));
    connections.connect_user("tenant-1").await.expect("connect_user must succeed");

    let llm = Arc::new(FakeLlmClient::new(ParseOutcome::Open {
        direction: Direction::Buy,
        symbol: "EURUSD".to_string(),
        entry: 1.1000,
        stop_loss: 1.0950,
        take_profits: vec![1.1050],
        confidence: 0.9,
        warnings: vec![],
        original_direction: None,
    }));
    let events: Arc<dyn EventBus> = Arc::new(InProcessEventBus::new());
    let router = SignalRouter::new(store_dyn, llm, events, connections, &router_config());

    let message = InboundMessage {
        text: "BUY EURUSD entry 1.1000 SL 1.0950 TP 1.1050".to_string(),
        channel_id: "chan-1".to_string(),
        channel_name: "Signals".to_string(),
        message_id: "msg-1".to_string(),
        timestamp: Utc::now(),
        tenant_id: Some("tenant-1".to_string()),
    };
    router.route_message(message).await.expect("routing must not error");

    let signal = find_signal_by_message(&store, "chan-1", "msg-1").await.expect("signal row must exist");
    assert_eq!(signal.status, SignalStatus::PendingConfirmation);
    assert!(signal.chosen_lot.is_some(), "a pre-computed lot must survive into confirmation");

    router.confirm_signal("tenant-1", &signal.id, None).await.expect("confirmation must not error");
    let confirmed = store.get_signal(&signal.id).await.unwrap().unwrap();
    assert_eq!(confirmed.status, SignalStatus::Executed);
}

#[tokio::test]
async fn the_same_message_id_never_creates_a_second_signal() {
    e2e_tests::init_tracing();
    let store = Arc::new(test_store().await);
    seed_tenant(&store, "tenant-1").await;
    seed_credentials(&store, "tenant-1").await;
    seed_broker_account(&store, "tenant-1", "acct-1", "bridge-1").await;
    seed_settings(
        &store,
        &TenantSettings {
            tenant_id: "tenant-1".to_string(),
            auto_accept_symbols: ["EURUSD".to_string()].into_iter().collect(),
            telegram_channel_ids: ["chan-1".to_string()].into_iter().collect(),
            ..TenantSettings::default()
        },
    )
    .await;

    let store_dyn: Arc<dyn SettingsStore> = store.clone();
    let bridge = Arc::new(FakeBridgeGateway::new(10_000.0, Quote { bid: 1.0999, ask: 1.1001 }));
    let bridge_dyn: Arc<dyn BridgeGateway> = bridge.clone();
    let telegram: Arc<dyn TelegramSession> = e2e_tests::fakes::shared_telegram();

    let connections = ConnectionManager::new(store_dyn.clone(), bridge_dyn, telegram, Duration::from_secs(30), Duration::from_secs(30));
    connections.connect_user("tenant-1").await.expect("connect_user must succeed");

    let llm = Arc::new(FakeLlmClient::new(ParseOutcome::Open {
        direction: Direction::Buy,
        symbol: "EURUSD".to_string(),
        entry: 1.1000,
        stop_loss: 1.0950,
        take_profits: vec![1.1050],
        confidence: 0.9,
        warnings: vec![],
        original_direction: None,
    }));
    let events: Arc<dyn EventBus> = Arc::new(InProcessEventBus::new());
    let router = SignalRouter::new(store_dyn, llm, events, connections, &router_config());

    let message = InboundMessage {
        text: "BUY EURUSD entry 1.1000 SL 1.0950 TP 1.1050".to_string(),
        channel_id: "chan-1".to_string(),
        channel_name: "Signals".to_string(),
        message_id: "msg-1".to_string(),
        timestamp: Utc::now(),
        tenant_id: Some("tenant-1".to_string()),
    };
    router.route_message(message.clone()).await.unwrap();
    router.route_message(message).await.unwrap();

    assert_eq!(bridge.order_count().await, 1, "the duplicate delivery must not place a second order");
}
