use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Pending,
    Onboarding,
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Free,
    Pro,
    Unlimited,
}

impl PlanTier {
    /// Monthly signal cap for the tier, `None` meaning unlimited.
    pub fn monthly_signal_limit(self) -> Option<u32> {
        match self {
            PlanTier::Free => Some(50),
            PlanTier::Pro => Some(1000),
            PlanTier::Unlimited => None,
        }
    }
}

/// Created and owned externally; the core only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub status: TenantStatus,
    pub role: TenantRole,
    pub plan_tier: PlanTier,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        matches!(self.status, TenantStatus::Active)
    }
}
