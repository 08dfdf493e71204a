use serde::{Deserialize, Serialize};

use crate::domain::models::Direction;

/// Body for `POST /api/tenants/:tenant_id/signals/:signal_id/confirm`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfirmSignalRequest {
    /// User-supplied lot override from the dashboard; clamped to
    /// `[0.01, max_lot_size]` rather than rejected (§8's universal lot bound).
    #[serde(default)]
    pub lot_override: Option<f64>,
}

/// Body for `POST /api/tenants/:tenant_id/signals/:signal_id/reject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectSignalRequest {
    pub reason: String,
}

/// Body for `POST /api/tenants/:tenant_id/signals/:signal_id/execute-corrected`,
/// used when the parser flagged the signal as geometrically straddled and a
/// human picks the direction to proceed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteCorrectedSignalRequest {
    pub direction: Direction,
}
