use chrono::{DateTime, Utc};
use copier_bridge_client::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Open,
    Closed,
    Cancelled,
}

/// One broker order resulting from a signal on one account. Weakly tied to a
/// `BrokerAccount`: if the account is later deleted, the historical row survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub tenant_id: String,
    pub signal_id: String,
    pub broker_account_id: String,
    pub broker_order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub lot_size: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub tp_index: u32,
    pub status: TradeStatus,
    pub open_price: Option<f64>,
    pub close_price: Option<f64>,
    pub profit: Option<f64>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}
