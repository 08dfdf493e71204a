//! Hand-rolled fakes for the three outbound ports. `mockall`'s generated
//! mocks are only compiled under `signal-server`'s own `cfg(test)`, so an
//! external crate cannot reach `MockBridgeGateway` et al.; these implement
//! the plain trait directly instead.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use copier_bridge_client::{AccountSnapshot, Deal, ExecutionResult, OrderRequest, Position, Quote};
use copier_signal_server::domain::models::{ParseOutcome, TenantCredentials};
use copier_signal_server::ports::{BridgeGateway, LlmClient, TelegramSession};

/// Broker bridge fake: one fixed quote and account balance, no positions.
/// Records every placed order so a test can assert on fill count and sizing.
pub struct FakeBridgeGateway {
    pub balance: f64,
    pub quote: Quote,
    pub placed_orders: Mutex<Vec<OrderRequest>>,
    pub positions: Mutex<HashMap<String, Position>>,
}

impl FakeBridgeGateway {
    pub fn new(balance: f64, quote: Quote) -> Self {
        Self { balance, quote, placed_orders: Mutex::new(Vec::new()), positions: Mutex::new(HashMap::new()) }
    }

    pub async fn order_count(&self) -> usize {
        self.placed_orders.lock().await.len()
    }
}

#[async_trait]
impl BridgeGateway for FakeBridgeGateway {
    async fn account_snapshot(&self, _bridge_account_id: &str) -> Result<AccountSnapshot> {
        let positions = self.positions.lock().await.values().cloned().collect();
        Ok(AccountSnapshot { balance: self.balance, equity: self.balance, positions })
    }

    async fn quote(&self, _bridge_account_id: &str, _symbol: &str) -> Result<Quote> {
        Ok(self.quote)
    }

    async fn positions(&self, _bridge_account_id: &str) -> Result<Vec<Position>> {
        Ok(self.positions.lock().await.values().cloned().collect())
    }

    async fn execute_order(&self, _bridge_account_id: &str, order: &OrderRequest) -> Result<ExecutionResult> {
        let order_id = format!("order-{}", self.placed_orders.lock().await.len() + 1);
        let fill_price = order.entry_price.unwrap_or(self.quote.mid());
        self.positions.lock().await.insert(
            order_id.clone(),
            Position {
                id: order_id.clone(),
                symbol: order.symbol.clone(),
                direction: order.direction,
                lot_size: order.lot_size,
                open_price: fill_price,
                stop_loss: Some(order.stop_loss),
                take_profit: Some(order.take_profit),
                opened_at: Utc::now(),
            },
        );
        self.placed_orders.lock().await.push(order.clone());
        Ok(ExecutionResult { broker_order_id: order_id, filled_price: Some(fill_price) })
    }

    async fn close_position(&self, _bridge_account_id: &str, position_id: &str) -> Result<()> {
        self.positions.lock().await.remove(position_id);
        Ok(())
    }

    async fn modify_stop(&self, _bridge_account_id: &str, position_id: &str, new_stop_loss: f64) -> Result<()> {
        if let Some(position) = self.positions.lock().await.get_mut(position_id) {
            position.stop_loss = Some(new_stop_loss);
        }
        Ok(())
    }

    async fn deals_by_position(&self, _bridge_account_id: &str, _position_id: &str) -> Result<Vec<Deal>> {
        Ok(Vec::new())
    }
}

/// LLM fake: returns whatever `ParseOutcome` the test configured, ignoring
/// the raw text entirely.
pub struct FakeLlmClient {
    outcome: ParseOutcome,
}

impl FakeLlmClient {
    pub fn new(outcome: ParseOutcome) -> Self {
        Self { outcome }
    }
}

#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn parse(&self, _raw_text: &str) -> ParseOutcome {
        self.outcome.clone()
    }
}

/// Telegram fake: a no-op transport that reports itself connected once
/// `connect` has been called, matching the shared-ingress contract the
/// connection manager relies on (`skip_telegram=true` bypasses this path
/// entirely, but the supervisor still touches `is_connected` via the watchdog).
pub struct FakeTelegramSession {
    connected: std::sync::atomic::AtomicBool,
}

impl Default for FakeTelegramSession {
    fn default() -> Self {
        Self { connected: std::sync::atomic::AtomicBool::new(false) }
    }
}

#[async_trait]
impl TelegramSession for FakeTelegramSession {
    async fn connect(&self, _credentials: &TenantCredentials, _channel_ids: &[String]) -> Result<()> {
        self.connected.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

pub fn shared_telegram() -> Arc<dyn TelegramSession> {
    Arc::new(FakeTelegramSession::default())
}
