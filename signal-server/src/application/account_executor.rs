use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::models::{AccountSnapshot, Deal, Direction, OrderType, Position, Quote, TpLotMode};
use crate::domain::services::{plan_tp_allocations, select_order_type, trade_planner::order_comment};
use crate::ports::BridgeGateway;

/// Projection of `TenantSettings` an executor needs, updated in place by
/// `reload_settings` (C6) without tearing the executor down.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub max_lot_size: f64,
    pub gold_market_threshold: f64,
    pub split_tps: bool,
    pub tp_lot_mode: TpLotMode,
    pub normalized_tp_ratios: Vec<f64>,
    pub symbol_suffix: String,
    pub comment_prefix: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub tp_index: u32,
    pub lot_size: f64,
    pub take_profit: f64,
    pub success: bool,
    pub broker_order_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QuoteResolutionError {
    #[error("market closed")]
    MarketClosed,
    #[error("symbol not found, tried {0}, {1}")]
    SymbolNotFound(String, String),
}

/// One executor per broker account per process (C5).
pub struct AccountExecutor {
    pub bridge_account_id: String,
    bridge: Arc<dyn BridgeGateway>,
    settings: RwLock<ExecutorSettings>,
    last_error: RwLock<Option<String>>,
}

impl AccountExecutor {
    pub fn new(bridge_account_id: String, bridge: Arc<dyn BridgeGateway>, settings: ExecutorSettings) -> Self {
        Self {
            bridge_account_id,
            bridge,
            settings: RwLock::new(settings),
            last_error: RwLock::new(None),
        }
    }

    pub async fn update_settings(&self, settings: ExecutorSettings) {
        *self.settings.write().await = settings;
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.read().await.clone()
    }

    pub async fn account_info(&self) -> anyhow::Result<AccountSnapshot> {
        self.bridge.account_snapshot(&self.bridge_account_id).await
    }

    pub async fn positions(&self) -> anyhow::Result<Vec<Position>> {
        self.bridge.positions(&self.bridge_account_id).await
    }

    pub async fn close_position(&self, position_id: &str) -> anyhow::Result<()> {
        self.bridge.close_position(&self.bridge_account_id, position_id).await
    }

    pub async fn modify_stop(&self, position_id: &str, new_stop_loss: f64) -> anyhow::Result<()> {
        self.bridge.modify_stop(&self.bridge_account_id, position_id, new_stop_loss).await
    }

    pub async fn deals_by_position(&self, position_id: &str) -> anyhow::Result<Vec<Deal>> {
        self.bridge.deals_by_position(&self.bridge_account_id, position_id).await
    }

    /// Public quote lookup (symbol-suffix fallback applied) for callers
    /// outside the executor, e.g. the router's market-distance check.
    pub async fn quote(&self, symbol: &str) -> anyhow::Result<Quote> {
        self.resolve_quote(symbol).await.map(|(quote, _)| quote).map_err(anyhow::Error::from)
    }

    /// Symbol-suffix fallback: try `symbol+suffix`, then bare `symbol`.
    async fn resolve_quote(&self, symbol: &str) -> Result<(Quote, String), QuoteResolutionError> {
        let suffix = self.settings.read().await.symbol_suffix.clone();
        let suffixed = format!("{symbol}{suffix}");
        if !suffix.is_empty() {
            if let Ok(quote) = self.bridge.quote(&self.bridge_account_id, &suffixed).await {
                return Ok((quote, suffixed));
            }
        }
        if let Ok(quote) = self.bridge.quote(&self.bridge_account_id, symbol).await {
            return Ok((quote, symbol.to_string()));
        }
        if crate::domain::services::trade_planner::is_weekend_market_closed(Utc::now(), symbol) {
            Err(QuoteResolutionError::MarketClosed)
        } else {
            Err(QuoteResolutionError::SymbolNotFound(suffixed, symbol.to_string()))
        }
    }

    /// Translates a validated signal into one or more orders, applying the
    /// order-type-selection table and TP splitting.
    pub async fn execute(
        &self,
        direction: Direction,
        symbol: &str,
        entry: f64,
        stop_loss: f64,
        take_profits: &[f64],
        lot_size: f64,
    ) -> Vec<ExecutionOutcome> {
        let (quote, resolved_symbol) = match self.resolve_quote(symbol).await {
            Ok(pair) => pair,
            Err(err) => {
                *self.last_error.write().await = Some(err.to_string());
                return vec![ExecutionOutcome {
                    tp_index: 1,
                    lot_size,
                    take_profit: take_profits.first().copied().unwrap_or(0.0),
                    success: false,
                    broker_order_id: None,
                    error: Some(err.to_string()),
                }];
            }
        };

        let settings = self.settings.read().await.clone();
        let order_type = select_order_type(direction, entry, quote.mid(), symbol, settings.gold_market_threshold);
        let allocations = plan_tp_allocations(
            take_profits,
            lot_size,
            settings.split_tps,
            settings.tp_lot_mode,
            &settings.normalized_tp_ratios,
        );

        let mut outcomes = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            let comment = order_comment(&settings.comment_prefix, allocation.tp_index);
            let request = crate::domain::models::OrderRequest {
                symbol: resolved_symbol.clone(),
                direction,
                order_type,
                lot_size: allocation.lot_size,
                entry_price: if matches!(order_type, OrderType::BuyMarket | OrderType::SellMarket) {
                    None
                } else {
                    Some(entry)
                },
                stop_loss,
                take_profit: allocation.take_profit,
                comment,
            };
            match self.bridge.execute_order(&self.bridge_account_id, &request).await {
                Ok(result) => outcomes.push(ExecutionOutcome {
                    tp_index: allocation.tp_index,
                    lot_size: allocation.lot_size,
                    take_profit: allocation.take_profit,
                    success: true,
                    broker_order_id: Some(result.broker_order_id),
                    error: None,
                }),
                Err(err) => {
                    *self.last_error.write().await = Some(err.to_string());
                    outcomes.push(ExecutionOutcome {
                        tp_index: allocation.tp_index,
                        lot_size: allocation.lot_size,
                        take_profit: allocation.take_profit,
                        success: false,
                        broker_order_id: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}
