pub mod pip_tables;
pub mod reconciliation;
pub mod signal_parser;
pub mod trade_planner;
pub mod validator;

pub use reconciliation::{summarize_closed_position, ClosedPositionSummary};
pub use trade_planner::{plan_tp_allocations, select_order_type, TpAllocation};
pub use validator::{OpenSignal, TradeValidator, ValidationOutcome};
