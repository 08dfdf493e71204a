use thiserror::Error;

/// Error codes the broker bridge is contractually allowed to surface to a user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeErrorCode {
    /// No candidate server matched; `candidates` lists alternatives the caller may retry with.
    SrvNotFound,
    Auth,
    ResourceSlots,
    NoSymbols,
    #[serde(rename = "ERR_OTP_REQUIRED")]
    OtpRequired,
    PasswordChangeRequired,
    TradingAccountDisabled,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bridge rejected request: {code:?}: {message}")]
    Rejected {
        code: BridgeErrorCode,
        message: String,
        candidates: Vec<String>,
    },

    #[error("account provisioning timed out after {attempts} attempts")]
    ProvisioningTimedOut { attempts: u32 },

    #[error("unexpected bridge response: {0}")]
    Protocol(String),
}
