use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn flip(self) -> Self {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    BuyMarket,
    BuyLimit,
    BuyStop,
    SellMarket,
    SellLimit,
    SellStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mt4,
    Mt5,
}

/// Live quote for a symbol as reported by the bridge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// An open broker position as reported by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub direction: Direction,
    pub lot_size: f64,
    pub open_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DealEntry {
    In,
    Out,
}

/// One atomic fill record on a position. A closed position has at least one
/// `DealEntry::In` and one `DealEntry::Out`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub position_id: String,
    pub entry: DealEntry,
    pub price: f64,
    pub profit: f64,
    pub time: DateTime<Utc>,
}

/// Account-level snapshot used by the trade validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub direction: Direction,
    pub order_type: OrderType,
    pub lot_size: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub broker_order_id: String,
    pub filled_price: Option<f64>,
}

/// Request to provision a new broker account with the bridge. `password` is
/// transit-only: forwarded to the bridge and never persisted by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionRequest {
    pub tenant_id: String,
    pub login: String,
    pub password: String,
    pub server: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProvisionStatus {
    Pending,
    Ready { bridge_account_id: String },
    Failed { code: super::BridgeErrorCode, message: String, #[serde(default)] candidates: Vec<String> },
}
