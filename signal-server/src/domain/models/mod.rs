pub mod broker_account;
pub mod credentials;
pub mod events;
pub mod settings;
pub mod signal;
pub mod tenant;
pub mod trade;

pub use broker_account::BrokerAccount;
pub use credentials::{Secret, TenantCredentials};
pub use events::BusEvent;
pub use settings::{TenantSettings, TpLotMode};
pub use signal::{LotModifierKind, ParseOutcome, Signal, SignalStatus, TakeProfit};
pub use tenant::{PlanTier, Tenant, TenantRole, TenantStatus};
pub use trade::{Trade, TradeStatus};

// Wire types shared with the broker bridge.
pub use copier_bridge_client::{
    AccountSnapshot, Deal, DealEntry, Direction, ExecutionResult, OrderRequest, OrderType,
    Platform, Position, Quote,
};
