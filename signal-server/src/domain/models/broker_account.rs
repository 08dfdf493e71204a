use copier_bridge_client::Platform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub id: String,
    pub tenant_id: String,
    pub alias: String,
    pub login: String,
    pub server: String,
    pub platform: Platform,
    pub bridge_account_id: Option<String>,
    pub is_active: bool,
    pub is_connected: bool,
    pub is_primary: bool,
}

impl BrokerAccount {
    pub fn is_connectable(&self) -> bool {
        self.is_active && self.bridge_account_id.is_some()
    }
}
