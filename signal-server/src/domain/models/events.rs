use serde::{Deserialize, Serialize};

/// Advisory, best-effort notification kinds published on the event bus (C1).
/// No component's correctness may depend on a subscriber actually observing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum BusEvent {
    SignalReceived { signal_id: String, tenant_id: String },
    SignalParsed { signal_id: String },
    SignalValidated { signal_id: String },
    SignalPendingConfirmation { signal_id: String },
    SignalExecuted { signal_id: String, successful_accounts: u32, total_accounts: u32 },
    SignalSkipped { signal_id: String, reason: String },
    SignalFailed { signal_id: String, reason: String },
    TradeOpened { trade_id: String, signal_id: String },
    TradeUpdated { trade_id: String },
    TradeClosed { trade_id: String, profit: f64 },
    AccountUpdated { tenant_id: String, broker_account_id: String },
    SystemStatus { message: String },
    ProvisioningProgress { tenant_id: String, broker_account_id: String, message: String },
    Error { tenant_id: Option<String>, message: String },
}
