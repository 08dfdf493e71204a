pub mod client;
pub mod errors;
pub mod types;

pub use client::BridgeClient;
pub use errors::{BridgeError, BridgeErrorCode};
pub use types::{
    AccountSnapshot, Deal, DealEntry, Direction, ExecutionResult, OrderRequest, OrderType,
    Platform, Position, ProvisionRequest, ProvisionStatus, Quote,
};
