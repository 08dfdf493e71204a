use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;

use crate::application::account_executor::{AccountExecutor, ExecutorSettings};
use crate::domain::models::{BrokerAccount, TenantCredentials, TenantSettings};
use crate::ports::{BridgeGateway, SettingsStore, TelegramSession};

fn executor_settings_from(tenant_id: &str, settings: &TenantSettings) -> ExecutorSettings {
    ExecutorSettings {
        max_lot_size: settings.max_lot_size,
        gold_market_threshold: settings.gold_market_threshold,
        split_tps: settings.split_tps,
        tp_lot_mode: settings.tp_lot_mode,
        normalized_tp_ratios: settings.normalized_tp_ratios(),
        symbol_suffix: settings.symbol_suffix.clone(),
        comment_prefix: tenant_id.chars().take(8).collect(),
    }
}

/// Owns one tenant's live resources: Telegram session, account executors,
/// and the tenant's current settings (C6).
pub struct ConnectionSupervisor {
    pub tenant_id: String,
    store: Arc<dyn SettingsStore>,
    bridge: Arc<dyn BridgeGateway>,
    telegram: Arc<dyn TelegramSession>,
    settings: RwLock<TenantSettings>,
    executors: RwLock<HashMap<String, Arc<AccountExecutor>>>,
    primary_account_id: RwLock<Option<String>>,
    telegram_connected: AtomicBool,
    is_active: AtomicBool,
}

impl ConnectionSupervisor {
    pub fn new(
        tenant_id: String,
        store: Arc<dyn SettingsStore>,
        bridge: Arc<dyn BridgeGateway>,
        telegram: Arc<dyn TelegramSession>,
        settings: TenantSettings,
    ) -> Self {
        Self {
            tenant_id,
            store,
            bridge,
            telegram,
            settings: RwLock::new(settings),
            executors: RwLock::new(HashMap::new()),
            primary_account_id: RwLock::new(None),
            telegram_connected: AtomicBool::new(false),
            is_active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    pub fn telegram_connected_flag(&self) -> bool {
        self.telegram_connected.load(Ordering::SeqCst)
    }

    pub async fn transport_connected(&self) -> bool {
        self.telegram.is_connected().await
    }

    /// `set_telegram_connected` is the watchdog's only write path onto this flag.
    pub fn set_telegram_connected(&self, connected: bool) {
        self.telegram_connected.store(connected, Ordering::SeqCst);
    }

    /// Brings the supervisor up: loads settings (already held), connects
    /// Telegram unless shared ingress asserts it externally, and connects
    /// every active broker account in parallel.
    pub async fn connect(&self, skip_telegram: bool, credentials: &TenantCredentials, accounts: Vec<BrokerAccount>) -> Result<()> {
        if !skip_telegram {
            let channel_ids: Vec<String> = self.settings.read().await.telegram_channel_ids.iter().cloned().collect();
            self.telegram.connect(credentials, &channel_ids).await?;
            self.telegram_connected.store(true, Ordering::SeqCst);
        } else {
            self.telegram_connected.store(true, Ordering::SeqCst);
        }

        let settings_snapshot = self.settings.read().await.clone();
        let mut tasks = Vec::new();
        for account in accounts.into_iter().filter(|a| a.is_connectable()) {
            let bridge = self.bridge.clone();
            let store = self.store.clone();
            let exec_settings = executor_settings_from(&self.tenant_id, &settings_snapshot);
            tasks.push(tokio::spawn(async move {
                let Some(bridge_account_id) = account.bridge_account_id.clone() else {
                    return None;
                };
                let executor = Arc::new(AccountExecutor::new(bridge_account_id, bridge, exec_settings));
                // touch the account once to confirm the bridge session is reachable.
                if executor.account_info().await.is_err() {
                    return None;
                }
                let _ = store.set_account_connected(&account.id, true).await;
                Some((account, executor))
            }));
        }

        let mut connected = Vec::with_capacity(tasks.len());
        for task in tasks {
            // A panicking connect task must not take down the others; treat it
            // the same as a connection failure for that one account.
            connected.push(task.await.unwrap_or(None));
        }

        let mut executors = self.executors.write().await;
        let mut primary = None;
        for (account, executor) in connected.into_iter().flatten() {
            if account.is_primary {
                primary = Some(account.id.clone());
            }
            executors.insert(account.id, executor);
        }
        drop(executors);

        let mut primary_guard = self.primary_account_id.write().await;
        *primary_guard = primary.or_else(|| {
            // No connected primary: fall back to any connected executor.
            None
        });
        if primary_guard.is_none() {
            let executors = self.executors.read().await;
            *primary_guard = executors.keys().next().cloned();
        }

        self.is_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Idempotent: tearing down an already-inactive supervisor is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        if !self.is_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.telegram.disconnect().await;
        self.telegram_connected.store(false, Ordering::SeqCst);

        let mut executors = self.executors.write().await;
        for (account_id, _) in executors.drain() {
            let _ = self.store.set_account_connected(&account_id, false).await;
        }
        *self.primary_account_id.write().await = None;
        Ok(())
    }

    /// Replaces the active `ExecutorSettings` on every executor in place, so
    /// the next `execute` call uses fresh values without teardown.
    pub async fn reload_settings(&self, new_settings: TenantSettings) {
        let exec_settings = executor_settings_from(&self.tenant_id, &new_settings);
        *self.settings.write().await = new_settings;
        let executors = self.executors.read().await;
        for executor in executors.values() {
            executor.update_settings(exec_settings.clone()).await;
        }
    }

    pub async fn primary_executor(&self) -> Option<Arc<AccountExecutor>> {
        let primary_id = self.primary_account_id.read().await.clone()?;
        self.executors.read().await.get(&primary_id).cloned()
    }

    pub async fn all_connected_executors(&self) -> Vec<Arc<AccountExecutor>> {
        self.executors.read().await.values().cloned().collect()
    }

    pub async fn has_connected_executor(&self) -> bool {
        !self.executors.read().await.is_empty()
    }

    pub async fn current_settings(&self) -> TenantSettings {
        self.settings.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AccountSnapshot;
    use crate::ports::outbound::{MockBridgeGateway, MockTelegramSession};
    use crate::ports::MockSettingsStore;

    fn account(id: &str, is_primary: bool) -> BrokerAccount {
        BrokerAccount {
            id: id.into(),
            tenant_id: "t1".into(),
            alias: id.into(),
            login: "123".into(),
            server: "demo".into(),
            platform: copier_bridge_client::Platform::Mt5,
            bridge_account_id: Some(format!("bridge-{id}")),
            is_active: true,
            is_connected: false,
            is_primary,
        }
    }

    fn credentials() -> TenantCredentials {
        TenantCredentials {
            tenant_id: "t1".into(),
            telegram_api_id: 1,
            telegram_api_hash: crate::domain::models::Secret::new("hash".into()),
            telegram_phone: "+1".into(),
            telegram_session: None,
            telegram_connected: false,
        }
    }

    #[tokio::test]
    async fn connect_promotes_the_primary_account_as_default_executor() {
        let mut store = MockSettingsStore::new();
        store.expect_set_account_connected().returning(|_, _| Ok(()));
        let mut bridge = MockBridgeGateway::new();
        bridge
            .expect_account_snapshot()
            .returning(|_| Ok(AccountSnapshot { balance: 1000.0, equity: 1000.0, positions: vec![] }));
        let mut telegram = MockTelegramSession::new();
        telegram.expect_is_connected().returning(|| true);

        let supervisor = ConnectionSupervisor::new(
            "t1".into(),
            Arc::new(store),
            Arc::new(bridge),
            Arc::new(telegram),
            TenantSettings { tenant_id: "t1".into(), ..TenantSettings::default() },
        );

        supervisor
            .connect(true, &credentials(), vec![account("a1", false), account("a2", true)])
            .await
            .unwrap();

        assert!(supervisor.is_active());
        assert!(supervisor.has_connected_executor().await);
        let primary = supervisor.primary_executor().await.unwrap();
        assert_eq!(primary.bridge_account_id, "bridge-a2");
    }

    #[tokio::test]
    async fn falls_back_to_any_connected_executor_when_no_primary_connects() {
        let mut store = MockSettingsStore::new();
        store.expect_set_account_connected().returning(|_, _| Ok(()));
        let mut bridge = MockBridgeGateway::new();
        bridge
            .expect_account_snapshot()
            .returning(|_| Ok(AccountSnapshot { balance: 1000.0, equity: 1000.0, positions: vec![] }));
        let mut telegram = MockTelegramSession::new();
        telegram.expect_is_connected().returning(|| true);

        let supervisor = ConnectionSupervisor::new(
            "t1".into(),
            Arc::new(store),
            Arc::new(bridge),
            Arc::new(telegram),
            TenantSettings::default(),
        );

        // Only a non-primary account is connectable.
        supervisor.connect(true, &credentials(), vec![account("a1", false)]).await.unwrap();
        assert!(supervisor.primary_executor().await.is_some());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let store = MockSettingsStore::new();
        let bridge = MockBridgeGateway::new();
        let mut telegram = MockTelegramSession::new();
        telegram.expect_disconnect().returning(|| Ok(()));

        let supervisor = ConnectionSupervisor::new(
            "t1".into(),
            Arc::new(store),
            Arc::new(bridge),
            Arc::new(telegram),
            TenantSettings::default(),
        );

        supervisor.disconnect().await.unwrap();
        supervisor.disconnect().await.unwrap();
        assert!(!supervisor.is_active());
    }
}
