use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TpLotMode {
    Split,
    Equal,
}

/// Per-tenant trading policy. `tp_split_ratios` is stored as entered and
/// normalized (divided by its own sum) wherever it is consumed, so the stored
/// value need not already sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tenant_id: String,
    pub max_risk_percent: f64,
    pub max_lot_size: f64,
    pub max_open_trades: u32,
    pub lot_reference_balance: f64,
    pub lot_reference_size_gold: f64,
    pub lot_reference_size_default: f64,
    pub auto_accept_symbols: BTreeSet<String>,
    pub gold_market_threshold: f64,
    pub split_tps: bool,
    pub tp_split_ratios: Vec<f64>,
    pub tp_lot_mode: TpLotMode,
    pub enable_breakeven: bool,
    pub symbol_suffix: String,
    pub telegram_channel_ids: BTreeSet<String>,
    pub paused: bool,
    /// Optional symbol allowlist consulted by the validator before anything
    /// else; `None` means no restriction.
    pub symbol_whitelist: Option<BTreeSet<String>>,
}

impl TenantSettings {
    /// Ratios normalized to sum to 1; an empty or all-zero input yields an
    /// even split across `len`.
    pub fn normalized_tp_ratios(&self) -> Vec<f64> {
        let sum: f64 = self.tp_split_ratios.iter().sum();
        if sum <= 0.0 {
            let len = self.tp_split_ratios.len().max(1);
            return vec![1.0 / len as f64; len];
        }
        self.tp_split_ratios.iter().map(|r| r / sum).collect()
    }

    pub fn lot_reference_size_for(&self, symbol: &str) -> f64 {
        if matches!(symbol, "XAUUSD" | "GOLD") {
            self.lot_reference_size_gold
        } else {
            self.lot_reference_size_default
        }
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            max_risk_percent: 2.0,
            max_lot_size: 5.0,
            max_open_trades: 10,
            lot_reference_balance: 1000.0,
            lot_reference_size_gold: 0.02,
            lot_reference_size_default: 0.1,
            auto_accept_symbols: BTreeSet::new(),
            gold_market_threshold: 3.0,
            split_tps: false,
            tp_split_ratios: Vec::new(),
            tp_lot_mode: TpLotMode::Split,
            enable_breakeven: false,
            symbol_suffix: String::new(),
            telegram_channel_ids: BTreeSet::new(),
            paused: false,
            symbol_whitelist: None,
        }
    }
}
