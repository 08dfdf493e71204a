use serde::{Deserialize, Serialize};
use std::fmt;

/// Wraps a value that must never be written to logs or Debug output.
/// The session blob and API hash are the two such values on `TenantCredentials`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Telegram credentials for one tenant. `telegram_session` is mutable and MUST
/// be persisted through the store whenever the Telegram library mutates it
/// (auth-key refresh).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantCredentials {
    pub tenant_id: String,
    pub telegram_api_id: i32,
    pub telegram_api_hash: Secret<String>,
    pub telegram_phone: String,
    pub telegram_session: Option<Secret<String>>,
    pub telegram_connected: bool,
}
