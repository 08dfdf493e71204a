//! Wires the adapters (SQLite store, HTTP bridge client, OpenAI-compatible
//! LLM client, shared Telegram ingress) to the application core (C1-C9) and
//! spawns its background loops.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use crate::adapters::outbound::{HttpBridgeGateway, OpenAiLlmClient, SqliteSettingsStore, TeloxideIngress};
use crate::application::{ConnectionManager, InProcessEventBus, SignalRouter};
use crate::config::Config;
use crate::domain::models::BusEvent;
use crate::ports::{BridgeGateway, EventBus, LlmClient, SettingsStore, TelegramSession};

pub struct ServiceRegistry {
    pub store: Arc<dyn SettingsStore>,
    pub connections: Arc<ConnectionManager>,
    pub router: Arc<SignalRouter>,
    pub events_tx: broadcast::Sender<String>,
}

pub async fn setup(config: &Config) -> Result<ServiceRegistry> {
    let store: Arc<dyn SettingsStore> = Arc::new(SqliteSettingsStore::new(&config.database.url).await.context("failed to open settings store")?);

    let bridge: Arc<dyn BridgeGateway> = Arc::new(HttpBridgeGateway::new(config.bridge.base_url.clone()));

    let llm_api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiLlmClient::new(llm_api_key, config.llm.api_base.clone(), config.llm.model.clone()));

    let events = Arc::new(InProcessEventBus::new());
    let (events_tx, _) = broadcast::channel::<String>(1024);
    {
        let sink = events_tx.clone();
        events
            .subscribe(Arc::new(move |event: BusEvent| {
                if let Ok(json) = serde_json::to_string(&event) {
                    // No connected dashboard clients is the common case; the
                    // bus contract is best-effort (§4.1), so a send error here
                    // is simply logged, never propagated.
                    let _ = sink.send(json);
                }
            }))
            .await;
    }

    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
    let ingress = Arc::new(TeloxideIngress::new(bot_token));

    let connections = ConnectionManager::new(
        store.clone(),
        bridge,
        ingress.clone() as Arc<dyn TelegramSession>,
        std::time::Duration::from_secs(config.connection_manager.watchdog_period_secs),
        std::time::Duration::from_secs(config.connection_manager.reconciler_period_secs),
    );

    let router = Arc::new(SignalRouter::new(store.clone(), llm, events as Arc<dyn EventBus>, connections.clone(), &config.router));
    ingress.set_router(router.clone());

    spawn_telegram_ingress(ingress);
    connections.spawn_watchdog();
    connections.spawn_reconciler();

    Ok(ServiceRegistry { store, connections, router, events_tx })
}

/// The shared listener (C9) connects in the background so a slow or
/// misconfigured Telegram bot never blocks server startup; a permanent
/// connect failure is logged as a fatal ingress error (§7 configuration).
fn spawn_telegram_ingress(ingress: Arc<TeloxideIngress>) {
    tokio::spawn(async move {
        if let Err(err) = ingress.connect_with_reconnect().await {
            tracing::error!(%err, "shared telegram ingress failed to start");
            return;
        }
        ingress.spawn_health_check();
    });
}
