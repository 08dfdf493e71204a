use chrono::{DateTime, Utc};
use copier_bridge_client::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Received,
    Parsed,
    Validated,
    PendingConfirmation,
    Executed,
    Partial,
    Skipped,
    Failed,
    Rejected,
}

impl SignalStatus {
    /// Terminal statuses never leave their state, except the single permitted
    /// `PendingConfirmation -> Executed|Partial|Rejected|Failed` transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SignalStatus::Executed
                | SignalStatus::Partial
                | SignalStatus::Skipped
                | SignalStatus::Failed
                | SignalStatus::Rejected
        )
    }

    pub fn can_transition_to(self, next: SignalStatus) -> bool {
        if self == next {
            return false;
        }
        if self == SignalStatus::PendingConfirmation {
            return matches!(
                next,
                SignalStatus::Executed
                    | SignalStatus::Partial
                    | SignalStatus::Rejected
                    | SignalStatus::Failed
            );
        }
        !self.is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeProfit {
    pub price: f64,
}

/// Persistent record of one inbound message's journey through the pipeline.
/// Uniqueness is enforced by `(tenant_id, channel_id, message_id)` at the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub tenant_id: String,
    pub channel_id: String,
    pub message_id: String,
    pub raw_text: String,
    pub received_at: DateTime<Utc>,
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profits: Vec<TakeProfit>,
    pub confidence: Option<f64>,
    pub warnings: Vec<String>,
    pub status: SignalStatus,
    pub failure_reason: Option<String>,
    pub parsed_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    /// Typed cache of the lot computed for an auto-accepted or
    /// pending-confirmation signal; `confirm_signal` prefers this over a
    /// fresh recompute but falls back transparently when absent.
    pub chosen_lot: Option<f64>,
}

impl Signal {
    pub fn transition(&mut self, next: SignalStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }
}

/// Tagged result of parsing one raw message (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParseOutcome {
    Open {
        direction: Direction,
        symbol: String,
        entry: f64,
        stop_loss: f64,
        take_profits: Vec<f64>,
        confidence: f64,
        warnings: Vec<String>,
        original_direction: Option<Direction>,
    },
    Close {
        symbol: String,
        confidence: f64,
        warnings: Vec<String>,
    },
    LotModifier {
        target_symbol: Option<String>,
        kind: LotModifierKind,
        multiplier: f64,
        confidence: f64,
        warnings: Vec<String>,
    },
    Rejected {
        reason: String,
        suggested_direction: Option<Direction>,
        partial_fields: Option<serde_json::Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotModifierKind {
    Double,
    Add,
}
