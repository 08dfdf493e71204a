use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::application::account_executor::AccountExecutor;
use crate::application::connection_manager::ConnectionManager;
use crate::domain::models::{
    BusEvent, Direction, LotModifierKind, ParseOutcome, PlanTier, Signal, SignalStatus, TakeProfit,
};
use crate::domain::services::signal_parser::{correct_direction, normalize_symbol, DirectionCorrection};
use crate::domain::services::{OpenSignal, TradeValidator};
use crate::ports::{EventBus, LlmClient, SettingsStore};

/// One inbound Telegram message, already stripped of transport detail (§4.9).
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: String,
    pub channel_id: String,
    pub channel_name: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub tenant_id: Option<String>,
}

struct SubscriptionCache {
    built_at: Instant,
    ttl: Duration,
    channel_to_tenants: HashMap<String, Vec<String>>,
}

impl SubscriptionCache {
    fn empty(ttl: Duration) -> Self {
        Self { built_at: Instant::now() - ttl - Duration::from_secs(1), ttl, channel_to_tenants: HashMap::new() }
    }

    fn is_fresh(&self) -> bool {
        self.built_at.elapsed() < self.ttl
    }
}

fn normalize_channel_id(raw: &str) -> String {
    raw.trim_start_matches('#').to_string()
}

/// Outcome of one multi-account dispatch (§4.8.c).
pub struct AccountExecutionResult {
    pub account_id: String,
    pub success: bool,
    pub executions: Vec<crate::application::account_executor::ExecutionOutcome>,
    pub error: Option<String>,
}

pub struct MultiAccountResult {
    pub total: u32,
    pub successful: u32,
    pub results: Vec<AccountExecutionResult>,
}

impl MultiAccountResult {
    fn overall_status(&self) -> SignalStatus {
        if self.total == 0 || self.successful == 0 {
            SignalStatus::Failed
        } else if self.successful == self.total {
            SignalStatus::Executed
        } else {
            SignalStatus::Partial
        }
    }
}

/// The stage machine (C8): turns one raw inbound message into zero or more
/// broker orders, one tenant at a time.
pub struct SignalRouter {
    store: Arc<dyn SettingsStore>,
    llm: Arc<dyn LlmClient>,
    events: Arc<dyn EventBus>,
    connections: Arc<ConnectionManager>,
    validator: TradeValidator,
    subscription_cache: RwLock<SubscriptionCache>,
    subscription_cache_ttl: Duration,
    min_signal_text_len: usize,
}

impl SignalRouter {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        llm: Arc<dyn LlmClient>,
        events: Arc<dyn EventBus>,
        connections: Arc<ConnectionManager>,
        config: &crate::config::RouterConfig,
    ) -> Self {
        let ttl = Duration::from_secs(config.subscription_cache_ttl_secs);
        Self {
            store,
            llm,
            events,
            connections,
            validator: TradeValidator::new(),
            subscription_cache: RwLock::new(SubscriptionCache::empty(ttl)),
            subscription_cache_ttl: ttl,
            min_signal_text_len: config.min_message_length,
        }
    }

    async fn subscribers_for(&self, channel_id: &str) -> Vec<String> {
        let channel_id = normalize_channel_id(channel_id);
        {
            let cache = self.subscription_cache.read().await;
            if cache.is_fresh() {
                return cache.channel_to_tenants.get(&channel_id).cloned().unwrap_or_default();
            }
        }
        self.refresh_subscription_cache().await;
        let cache = self.subscription_cache.read().await;
        cache.channel_to_tenants.get(&channel_id).cloned().unwrap_or_default()
    }

    async fn refresh_subscription_cache(&self) {
        let rows = match self.store.all_channel_subscriptions().await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(%err, "failed to refresh channel subscription cache");
                return;
            }
        };
        let mut channel_to_tenants: HashMap<String, Vec<String>> = HashMap::new();
        for (channel_id, tenant_id) in rows {
            channel_to_tenants.entry(normalize_channel_id(&channel_id)).or_default().push(tenant_id);
        }
        *self.subscription_cache.write().await =
            SubscriptionCache { built_at: Instant::now(), ttl: self.subscription_cache_ttl, channel_to_tenants };
    }

    /// Shared-ingress entry point (§4.9): fans a message out to every tenant
    /// subscribed to its channel, in parallel, isolating per-tenant failures.
    pub async fn route_message_to_subscribers(&self, message: InboundMessage) {
        if message.text.trim().len() < self.min_signal_text_len {
            return;
        }
        let subscribers = self.subscribers_for(&message.channel_id).await;
        if subscribers.is_empty() {
            tracing::info!(channel_id = %message.channel_id, channel_name = %message.channel_name, "no subscribers for channel; message ignored");
            return;
        }

        let mut tasks = Vec::with_capacity(subscribers.len());
        for tenant_id in subscribers {
            let mut per_tenant = message.clone();
            per_tenant.tenant_id = Some(tenant_id.clone());
            tasks.push(async move { (tenant_id, self.route_message(per_tenant).await) });
        }
        for (tenant_id, result) in futures::future::join_all(tasks).await {
            if let Err(err) = result {
                tracing::error!(tenant_id = %tenant_id, %err, "error routing signal to subscriber");
            }
        }
    }

    /// Per-tenant entry point (§4.8 steps 1-13).
    pub async fn route_message(&self, message: InboundMessage) -> Result<()> {
        let Some(tenant_id) = message.tenant_id.clone() else {
            tracing::warn!("route_message called without a tenant_id");
            return Ok(());
        };
        if message.text.trim().len() < self.min_signal_text_len {
            return Ok(());
        }

        let settings = match self.store.get_settings(&tenant_id).await? {
            Some(s) => s,
            None => return Ok(()),
        };
        if settings.paused {
            return Ok(());
        }

        // 1. Duplicate check.
        let signal = match self
            .store
            .find_or_create_signal(&tenant_id, &message.channel_id, &message.message_id, &message.text, message.timestamp)
            .await?
        {
            Some(signal) => signal,
            None => return Ok(()), // duplicate: already processed.
        };
        // 2. Emit signal.received.
        self.events.emit(BusEvent::SignalReceived { signal_id: signal.id.clone(), tenant_id: tenant_id.clone() }).await;

        // 3. Parse (C3). By contract this call never raises.
        let outcome = self.llm.parse(&message.text).await;

        match outcome {
            ParseOutcome::Rejected { reason, suggested_direction: _, partial_fields } => {
                let mut signal = signal;
                signal.failure_reason = Some(reason.clone());
                if let Some(partials) = partial_fields {
                    signal.warnings.push(format!("partial extraction: {partials}"));
                }
                signal.transition(SignalStatus::Skipped);
                self.store.update_signal(&signal).await?;
                self.events.emit(BusEvent::SignalSkipped { signal_id: signal.id.clone(), reason }).await;
                Ok(())
            }
            ParseOutcome::Close { symbol, confidence: _, warnings: _ } => self.handle_close(&tenant_id, signal, &symbol).await,
            ParseOutcome::LotModifier { target_symbol, kind, multiplier, confidence: _, warnings: _ } => {
                self.handle_lot_modifier(&tenant_id, signal, target_symbol, kind, multiplier).await
            }
            ParseOutcome::Open { direction, symbol, entry, stop_loss, take_profits, confidence, warnings, original_direction: _ } => {
                self.handle_open(&tenant_id, &settings, signal, direction, symbol, entry, stop_loss, take_profits, confidence, warnings)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_open(
        &self,
        tenant_id: &str,
        settings: &crate::domain::models::TenantSettings,
        mut signal: Signal,
        mut direction: Direction,
        raw_symbol: String,
        entry: f64,
        stop_loss: f64,
        take_profits: Vec<f64>,
        confidence: f64,
        mut warnings: Vec<String>,
    ) -> Result<()> {
        let symbol = normalize_symbol(&raw_symbol);

        // Contract 2: correct a geometrically-inverted stated direction.
        match correct_direction(direction, entry, stop_loss, &take_profits) {
            DirectionCorrection::Corrected { corrected, original } => {
                warnings.push(format!("direction corrected from {original:?} to {corrected:?} by take-profit geometry"));
                direction = corrected;
            }
            DirectionCorrection::Straddled { .. } => {
                signal.failure_reason = Some("take profits straddle the entry price".into());
                signal.transition(SignalStatus::Skipped);
                self.store.update_signal(&signal).await?;
                self.events
                    .emit(BusEvent::SignalSkipped { signal_id: signal.id.clone(), reason: "geometrically incoherent".into() })
                    .await;
                return Ok(());
            }
            DirectionCorrection::Unchanged => {}
        }

        // 5. Persist parsed fields, transition parsed.
        signal.symbol = Some(symbol.clone());
        signal.direction = Some(direction);
        signal.entry = Some(entry);
        signal.stop_loss = Some(stop_loss);
        signal.take_profits = take_profits.iter().map(|price| TakeProfit { price: *price }).collect();
        signal.confidence = Some(confidence);
        signal.warnings.extend(warnings);
        signal.transition(SignalStatus::Parsed);
        self.store.update_signal(&signal).await?;
        self.events.emit(BusEvent::SignalParsed { signal_id: signal.id.clone() }).await;

        // 6. At least one connected executor.
        let executors = self.connections.get_all_executors(tenant_id).await;
        if executors.is_empty() {
            return self.fail(signal, "No accounts connected").await;
        }
        let Some(primary) = self.connections.get_primary_executor(tenant_id).await else {
            return self.fail(signal, "No accounts connected").await;
        };

        // 7. Account snapshot from the primary executor.
        let account = match primary.account_info().await {
            Ok(account) => account,
            Err(err) => return self.fail(signal, &format!("Failed to fetch account snapshot: {err}")).await,
        };

        // 8. Validate.
        let open_signal = OpenSignal { symbol: &symbol, direction, entry, stop_loss, take_profits: &take_profits, confidence };
        let market_quote = primary.quote(&symbol).await.ok();
        let validation = self.validator.validate(&open_signal, &account, settings, market_quote);
        signal.warnings.extend(validation.warnings.clone());
        if !validation.passed {
            let reason = validation.errors.join("; ");
            signal.failure_reason = Some(reason.clone());
            signal.transition(SignalStatus::Failed);
            self.store.update_signal(&signal).await?;
            self.events.emit(BusEvent::SignalFailed { signal_id: signal.id.clone(), reason }).await;
            return Ok(());
        }
        signal.transition(SignalStatus::Validated);
        self.store.update_signal(&signal).await?;
        self.events.emit(BusEvent::SignalValidated { signal_id: signal.id.clone() }).await;

        // 9. Final lot: validator result clamped into [0.01, max_lot_size].
        let chosen_lot = validation.adjusted_lot_size.unwrap_or(0.01).clamp(0.01, settings.max_lot_size);
        signal.chosen_lot = Some(chosen_lot);

        // 10. Auto-accept gate.
        if !settings.auto_accept_symbols.contains(&symbol) {
            signal.transition(SignalStatus::PendingConfirmation);
            self.store.update_signal(&signal).await?;
            self.events.emit(BusEvent::SignalPendingConfirmation { signal_id: signal.id.clone() }).await;
            return Ok(());
        }

        // 11. Plan-tier signal limit.
        let tenant = self.store.get_tenant(tenant_id).await?;
        let plan_tier = tenant.map(|t| t.plan_tier).unwrap_or(PlanTier::Free);
        if !self.store.increment_and_check_signal_limit(tenant_id, plan_tier).await? {
            return self.fail(signal, &format!("Monthly signal limit reached for plan {plan_tier:?}")).await;
        }

        // 12-13. Execute across every connected executor, persist trades.
        let result = self.execute_on_all_accounts(&executors, direction, &symbol, entry, stop_loss, &take_profits, chosen_lot).await;
        self.persist_execution(tenant_id, &mut signal, &result).await
    }

    async fn handle_close(&self, tenant_id: &str, mut signal: Signal, raw_symbol: &str) -> Result<()> {
        let symbol = normalize_symbol(raw_symbol);
        let executors = self.connections.get_all_executors(tenant_id).await;

        let mut tasks = Vec::with_capacity(executors.len());
        for executor in executors {
            let symbol = symbol.clone();
            tasks.push(async move { close_matching_positions(&executor, &symbol).await });
        }
        let closed: u32 = futures::future::join_all(tasks).await.into_iter().sum();

        if closed > 0 {
            signal.transition(SignalStatus::Executed);
            self.store.update_signal(&signal).await?;
            self.events.emit(BusEvent::SignalExecuted { signal_id: signal.id.clone(), successful_accounts: closed, total_accounts: closed }).await;
        } else {
            signal.transition(SignalStatus::Skipped);
            self.store.update_signal(&signal).await?;
            self.events.emit(BusEvent::SignalSkipped { signal_id: signal.id.clone(), reason: "no matching open position".into() }).await;
        }
        Ok(())
    }

    async fn handle_lot_modifier(
        &self,
        tenant_id: &str,
        mut signal: Signal,
        target_symbol: Option<String>,
        kind: LotModifierKind,
        multiplier: f64,
    ) -> Result<()> {
        let symbol = normalize_symbol(target_symbol.as_deref().unwrap_or("XAUUSD"));
        let executors = self.connections.get_all_executors(tenant_id).await;

        let mut tasks = Vec::with_capacity(executors.len());
        for executor in executors {
            let symbol = symbol.clone();
            tasks.push(async move { apply_lot_modifier(&executor, &symbol, kind, multiplier).await });
        }
        let outcomes: Vec<bool> = futures::future::join_all(tasks).await;
        let successful = outcomes.into_iter().filter(|ok| *ok).count() as u32;

        if successful > 0 {
            signal.transition(SignalStatus::Executed);
            self.store.update_signal(&signal).await?;
            self.events
                .emit(BusEvent::SignalExecuted { signal_id: signal.id.clone(), successful_accounts: successful, total_accounts: successful })
                .await;
        } else {
            signal.failure_reason = Some("lot modifier failed on every account".into());
            signal.transition(SignalStatus::Failed);
            self.store.update_signal(&signal).await?;
            self.events.emit(BusEvent::SignalFailed { signal_id: signal.id.clone(), reason: "lot modifier failed on every account".into() }).await;
        }
        Ok(())
    }

    /// §4.8.c: one task per connected executor, no exception from one may
    /// cancel another.
    #[allow(clippy::too_many_arguments)]
    async fn execute_on_all_accounts(
        &self,
        executors: &[Arc<AccountExecutor>],
        direction: Direction,
        symbol: &str,
        entry: f64,
        stop_loss: f64,
        take_profits: &[f64],
        lot_size: f64,
    ) -> MultiAccountResult {
        let mut tasks = Vec::with_capacity(executors.len());
        for executor in executors.iter().cloned() {
            let symbol = symbol.to_string();
            let take_profits = take_profits.to_vec();
            tasks.push(tokio::spawn(async move {
                let executions = executor.execute(direction, &symbol, entry, stop_loss, &take_profits, lot_size).await;
                let success = executions.iter().any(|e| e.success);
                let error = if success { None } else { executor.last_error().await };
                AccountExecutionResult { account_id: executor.bridge_account_id.clone(), success, executions, error }
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(join_err) => results.push(AccountExecutionResult {
                    account_id: "unknown".into(),
                    success: false,
                    executions: vec![],
                    error: Some(join_err.to_string()),
                }),
            }
        }

        let total = results.len() as u32;
        let successful = results.iter().filter(|r| r.success).count() as u32;
        MultiAccountResult { total, successful, results }
    }

    async fn persist_execution(&self, tenant_id: &str, signal: &mut Signal, result: &MultiAccountResult) -> Result<()> {
        for account_result in &result.results {
            for execution in &account_result.executions {
                if !execution.success {
                    continue;
                }
                let Some(broker_order_id) = execution.broker_order_id.clone() else { continue };
                let trade = crate::domain::models::Trade {
                    id: uuid::Uuid::new_v4().to_string(),
                    tenant_id: tenant_id.to_string(),
                    signal_id: signal.id.clone(),
                    broker_account_id: account_result.account_id.clone(),
                    broker_order_id,
                    symbol: signal.symbol.clone().unwrap_or_default(),
                    direction: signal.direction.unwrap_or(Direction::Buy),
                    lot_size: execution.lot_size,
                    entry: signal.entry.unwrap_or(0.0),
                    stop_loss: signal.stop_loss.unwrap_or(0.0),
                    take_profit: execution.take_profit,
                    tp_index: execution.tp_index,
                    status: crate::domain::models::TradeStatus::Open,
                    open_price: None,
                    close_price: None,
                    profit: None,
                    opened_at: Some(Utc::now()),
                    closed_at: None,
                };
                self.store.create_trade(&trade).await?;
                self.events.emit(BusEvent::TradeOpened { trade_id: trade.id.clone(), signal_id: signal.id.clone() }).await;
            }
        }

        let status = result.overall_status();
        signal.transition(status);
        if result.successful == 0 {
            let reason = result
                .results
                .iter()
                .filter_map(|r| r.error.clone())
                .next()
                .unwrap_or_else(|| "execution failed on every account".into());
            signal.failure_reason = Some(reason.clone());
            self.store.update_signal(signal).await?;
            self.events.emit(BusEvent::SignalFailed { signal_id: signal.id.clone(), reason }).await;
        } else {
            self.store.update_signal(signal).await?;
            self.events
                .emit(BusEvent::SignalExecuted { signal_id: signal.id.clone(), successful_accounts: result.successful, total_accounts: result.total })
                .await;
        }
        Ok(())
    }

    async fn fail(&self, mut signal: Signal, reason: &str) -> Result<()> {
        signal.failure_reason = Some(reason.to_string());
        signal.transition(SignalStatus::Failed);
        self.store.update_signal(&signal).await?;
        self.events.emit(BusEvent::SignalFailed { signal_id: signal.id.clone(), reason: reason.to_string() }).await;
        Ok(())
    }

    /// Only valid from `pending_confirmation`. `lot_override`, when present
    /// and positive, is clamped rather than rejected (§8 universal lot bound).
    pub async fn confirm_signal(&self, tenant_id: &str, signal_id: &str, lot_override: Option<f64>) -> Result<()> {
        let mut signal = match self.store.get_signal(signal_id).await? {
            Some(signal) if signal.tenant_id == tenant_id => signal,
            _ => return Ok(()),
        };
        if signal.status != SignalStatus::PendingConfirmation {
            return Ok(());
        }
        let (Some(direction), Some(symbol), Some(entry), Some(stop_loss)) = (signal.direction, signal.symbol.clone(), signal.entry, signal.stop_loss)
        else {
            return self.fail(signal, "Missing required fields").await;
        };
        let take_profits: Vec<f64> = signal.take_profits.iter().map(|tp| tp.price).collect();
        if take_profits.is_empty() {
            return self.fail(signal, "No take profit levels defined").await;
        }

        let settings = match self.store.get_settings(tenant_id).await? {
            Some(s) => s,
            None => return self.fail(signal, "No settings found").await,
        };
        let executors = self.connections.get_all_executors(tenant_id).await;
        if executors.is_empty() {
            return self.fail(signal, "No accounts connected").await;
        }

        let lot_size = match lot_override.filter(|lot| *lot > 0.0) {
            Some(lot) => lot,
            None => match signal.chosen_lot {
                Some(lot) => lot,
                None => {
                    let primary = self.connections.get_primary_executor(tenant_id).await;
                    let account = match &primary {
                        Some(executor) => executor.account_info().await.ok(),
                        None => None,
                    }
                    .unwrap_or(crate::domain::models::AccountSnapshot { balance: 0.0, equity: 0.0, positions: vec![] });
                    account.balance / settings.lot_reference_balance * settings.lot_reference_size_for(&symbol)
                }
            },
        }
        .clamp(0.01, settings.max_lot_size);

        let tenant = self.store.get_tenant(tenant_id).await?;
        let plan_tier = tenant.map(|t| t.plan_tier).unwrap_or(PlanTier::Free);
        if !self.store.increment_and_check_signal_limit(tenant_id, plan_tier).await? {
            return self.fail(signal, &format!("Monthly signal limit reached for plan {plan_tier:?}")).await;
        }

        let result = self.execute_on_all_accounts(&executors, direction, &symbol, entry, stop_loss, &take_profits, lot_size).await;
        self.persist_execution(tenant_id, &mut signal, &result).await
    }

    pub async fn reject_signal(&self, tenant_id: &str, signal_id: &str, reason: &str) -> Result<()> {
        let mut signal = match self.store.get_signal(signal_id).await? {
            Some(signal) if signal.tenant_id == tenant_id => signal,
            _ => return Ok(()),
        };
        if signal.status != SignalStatus::PendingConfirmation {
            return Ok(());
        }
        signal.failure_reason = Some(reason.to_string());
        signal.transition(SignalStatus::Rejected);
        self.store.update_signal(&signal).await
    }

    /// Re-validates a `skipped`/`failed` signal with the direction flipped
    /// and executes it. Used for straddled or manually-overridden signals.
    pub async fn execute_corrected_signal(&self, tenant_id: &str, signal_id: &str, direction: Direction) -> Result<()> {
        let signal = match self.store.get_signal(signal_id).await? {
            Some(signal) if signal.tenant_id == tenant_id => signal,
            _ => return Ok(()),
        };
        if !matches!(signal.status, SignalStatus::Skipped | SignalStatus::Failed) {
            return Ok(());
        }
        let (Some(symbol), Some(entry), Some(stop_loss)) = (signal.symbol.clone(), signal.entry, signal.stop_loss) else {
            return Ok(());
        };
        let take_profits: Vec<f64> = signal.take_profits.iter().map(|tp| tp.price).collect();
        let settings = match self.store.get_settings(tenant_id).await? {
            Some(s) => s,
            None => return Ok(()),
        };
        self.handle_open(
            tenant_id,
            &settings,
            signal,
            direction,
            symbol,
            entry,
            stop_loss,
            take_profits,
            0.8, // manually confirmed: above the confidence floor by construction.
            vec!["manually corrected".into()],
        )
        .await
    }
}

async fn close_matching_positions(executor: &AccountExecutor, symbol: &str) -> u32 {
    let positions = match executor.positions().await {
        Ok(positions) => positions,
        Err(_) => return 0,
    };
    let mut closed = 0;
    for position in positions.iter().filter(|p| p.symbol.eq_ignore_ascii_case(symbol)) {
        if executor.close_position(&position.id).await.is_ok() {
            closed += 1;
        }
    }
    closed
}

async fn apply_lot_modifier(executor: &AccountExecutor, symbol: &str, kind: LotModifierKind, multiplier: f64) -> bool {
    let positions = match executor.positions().await {
        Ok(positions) => positions,
        Err(_) => return false,
    };
    let Some(position) = positions
        .iter()
        .filter(|p| p.symbol.eq_ignore_ascii_case(symbol))
        .max_by_key(|p| p.opened_at)
    else {
        return false;
    };

    let new_lot = match kind {
        LotModifierKind::Double => position.lot_size,
        LotModifierKind::Add => round2(position.lot_size * multiplier),
    }
    .clamp(0.01, f64::MAX);

    let take_profit = position.take_profit.unwrap_or(position.open_price);
    let stop_loss = position.stop_loss.unwrap_or(position.open_price);
    let outcomes = executor.execute(position.direction, symbol, position.open_price, stop_loss, &[take_profit], new_lot).await;
    outcomes.iter().any(|o| o.success)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TenantSettings;
    use crate::ports::outbound::{MockBridgeGateway, MockLlmClient};
    use crate::ports::{MockEventBus, MockSettingsStore};

    fn settings(tenant_id: &str) -> TenantSettings {
        TenantSettings { tenant_id: tenant_id.into(), auto_accept_symbols: Default::default(), ..TenantSettings::default() }
    }

    fn router_with(store: MockSettingsStore, llm: MockLlmClient, events: MockEventBus) -> SignalRouter {
        let connections = ConnectionManager::new(
            Arc::new(MockSettingsStore::new()),
            Arc::new(MockBridgeGateway::new()),
            Arc::new(crate::ports::outbound::MockTelegramSession::new()),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );
        SignalRouter::new(Arc::new(store), Arc::new(llm), Arc::new(events), connections, &crate::config::RouterConfig::default())
    }

    #[tokio::test]
    async fn short_messages_are_dropped_before_any_store_access() {
        // No expectations set on any mock: a single call would panic.
        let router = router_with(MockSettingsStore::new(), MockLlmClient::new(), MockEventBus::new());
        let message = InboundMessage {
            text: "buy".into(),
            channel_id: "c1".into(),
            channel_name: "chan".into(),
            message_id: "m1".into(),
            timestamp: Utc::now(),
            tenant_id: Some("t1".into()),
        };
        router.route_message(message).await.unwrap();
    }

    #[tokio::test]
    async fn a_rejected_parse_marks_the_signal_skipped() {
        let mut store = MockSettingsStore::new();
        store.expect_get_settings().returning(|tenant_id| Ok(Some(settings(tenant_id))));
        store.expect_find_or_create_signal().returning(|tenant_id, channel_id, message_id, raw_text, received_at| {
            Ok(Some(Signal {
                id: "s1".into(),
                tenant_id: tenant_id.into(),
                channel_id: channel_id.into(),
                message_id: message_id.into(),
                raw_text: raw_text.into(),
                received_at,
                symbol: None,
                direction: None,
                entry: None,
                stop_loss: None,
                take_profits: vec![],
                confidence: None,
                warnings: vec![],
                status: SignalStatus::Received,
                failure_reason: None,
                parsed_at: None,
                executed_at: None,
                chosen_lot: None,
            }))
        });
        store.expect_update_signal().returning(|_| Ok(()));

        let mut llm = MockLlmClient::new();
        llm.expect_parse()
            .returning(|_| ParseOutcome::Rejected { reason: "no trade intent".into(), suggested_direction: None, partial_fields: None });

        let mut events = MockEventBus::new();
        events.expect_emit().returning(|_| ());

        let router = router_with(store, llm, events);

        let message = InboundMessage {
            text: "just chatting about the weather today".into(),
            channel_id: "c1".into(),
            channel_name: "chan".into(),
            message_id: "m1".into(),
            timestamp: Utc::now(),
            tenant_id: Some("t1".into()),
        };
        router.route_message(message).await.unwrap();
    }

    #[tokio::test]
    async fn a_paused_tenant_is_skipped_before_any_signal_is_created() {
        let mut store = MockSettingsStore::new();
        store.expect_get_settings().returning(|tenant_id| {
            Ok(Some(TenantSettings { tenant_id: tenant_id.into(), paused: true, ..TenantSettings::default() }))
        });
        let router = router_with(store, MockLlmClient::new(), MockEventBus::new());

        let message = InboundMessage {
            text: "BUY EURUSD entry 1.1000 SL 1.0950 TP 1.1050".into(),
            channel_id: "c1".into(),
            channel_name: "chan".into(),
            message_id: "m1".into(),
            timestamp: Utc::now(),
            tenant_id: Some("t1".into()),
        };
        router.route_message(message).await.unwrap();
    }
}
