use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level, layered configuration for the signal-server process.
///
/// Loaded via [`Config::from_file`] from three layered TOML sources, exactly
/// the teacher's `Config::from_file` layering: a required base file, an
/// optional `{base}.{CONFIG_ENV}.toml`, and an optional `{base}.local.toml`
/// for untracked personal overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub llm: LlmConfig,
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub connection_manager: ConnectionManagerConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,
    #[serde(default = "default_log_directory")]
    pub directory: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

fn default_logging_enabled() -> bool {
    true
}
fn default_log_directory() -> String {
    "logs".to_string()
}
fn default_log_file_prefix() -> String {
    "signal-server".to_string()
}
fn default_log_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            rotation: default_log_rotation(),
        }
    }
}

/// The LLM vendor is a black box (§6); this is only the ambient client
/// configuration the parser adapter (C3) needs to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_llm_max_retries() -> u32 {
    3
}
fn default_llm_initial_backoff_ms() -> u64 {
    500
}

/// The broker-bridge is a black box (§6); provisioning poll interval and
/// timeouts per the external-interfaces contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub base_url: String,
    #[serde(default = "default_bridge_account_query_timeout_secs")]
    pub account_query_timeout_secs: u64,
    #[serde(default = "default_bridge_provisioning_poll_secs")]
    pub provisioning_poll_secs: u64,
    #[serde(default = "default_bridge_provisioning_max_attempts")]
    pub provisioning_max_attempts: u32,
}

fn default_bridge_account_query_timeout_secs() -> u64 {
    30
}
fn default_bridge_provisioning_poll_secs() -> u64 {
    6
}
fn default_bridge_provisioning_max_attempts() -> u32 {
    10
}

/// Defaults used when a tenant's own `telegram_api_id`/`telegram_api_hash`
/// are not yet set (pre-onboarding); overridden per-tenant by `TenantCredentials`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_telegram_session_health_check_secs")]
    pub session_health_check_secs: u64,
    #[serde(default = "default_telegram_reconnect_initial_delay_secs")]
    pub reconnect_initial_delay_secs: u64,
    #[serde(default = "default_telegram_reconnect_max_delay_secs")]
    pub reconnect_max_delay_secs: u64,
    #[serde(default = "default_telegram_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,
    #[serde(default = "default_telegram_listener_restart_max_attempts")]
    pub listener_restart_max_attempts: u32,
}

fn default_telegram_session_health_check_secs() -> u64 {
    60
}
fn default_telegram_reconnect_initial_delay_secs() -> u64 {
    5
}
fn default_telegram_reconnect_max_delay_secs() -> u64 {
    300
}
fn default_telegram_reconnect_max_attempts() -> u32 {
    10
}
fn default_telegram_listener_restart_max_attempts() -> u32 {
    5
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            session_health_check_secs: default_telegram_session_health_check_secs(),
            reconnect_initial_delay_secs: default_telegram_reconnect_initial_delay_secs(),
            reconnect_max_delay_secs: default_telegram_reconnect_max_delay_secs(),
            reconnect_max_attempts: default_telegram_reconnect_max_attempts(),
            listener_restart_max_attempts: default_telegram_listener_restart_max_attempts(),
        }
    }
}

/// Periods for the two connection-manager background loops (C7) and
/// configuration reload polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionManagerConfig {
    #[serde(default = "default_watchdog_period_secs")]
    pub watchdog_period_secs: u64,
    #[serde(default = "default_reconciler_period_secs")]
    pub reconciler_period_secs: u64,
    #[serde(default = "default_config_retry_period_secs")]
    pub config_retry_period_secs: u64,
}

fn default_watchdog_period_secs() -> u64 {
    30
}
fn default_reconciler_period_secs() -> u64 {
    30
}
fn default_config_retry_period_secs() -> u64 {
    30
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            watchdog_period_secs: default_watchdog_period_secs(),
            reconciler_period_secs: default_reconciler_period_secs(),
            config_retry_period_secs: default_config_retry_period_secs(),
        }
    }
}

/// Router-level tunables: subscription-cache TTL and the minimum message
/// length below which a message is dropped before the stage machine runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_subscription_cache_ttl_secs")]
    pub subscription_cache_ttl_secs: u64,
    #[serde(default = "default_min_message_length")]
    pub min_message_length: usize,
}

fn default_subscription_cache_ttl_secs() -> u64 {
    60
}
fn default_min_message_length() -> usize {
    8
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            subscription_cache_ttl_secs: default_subscription_cache_ttl_secs(),
            min_message_length: default_min_message_length(),
        }
    }
}

impl Config {
    /// Loads layered TOML configuration.
    ///
    /// 1. `{base_name}.toml` (required)
    /// 2. `{base_name}.{CONFIG_ENV}.toml` (optional, only if `CONFIG_ENV` is set)
    /// 3. `{base_name}.local.toml` (optional, untracked personal overrides)
    pub fn from_file<P: AsRef<Path>>(base_name: P) -> Result<Self> {
        let base_path = base_name.as_ref();
        let base_str = base_path.to_str().context("invalid base config path")?;

        let mut builder = config::Config::builder().add_source(config::File::with_name(base_str));

        if let Ok(env) = std::env::var("CONFIG_ENV") {
            let env_config = format!("{}.{}", base_str, env);
            builder = builder.add_source(config::File::with_name(&env_config).required(false));
        }

        let local_config = format!("{}.local", base_str);
        builder = builder.add_source(config::File::with_name(&local_config).required(false));

        let built = builder.build().context("failed to build layered configuration")?;
        built.try_deserialize().context("failed to deserialize configuration")
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_address_combines_host_and_port() {
        let config = Config {
            server: ServerConfig { host: "127.0.0.1".into(), port: 9090 },
            database: DatabaseConfig { url: "sqlite://test.db".into() },
            logging: LoggingConfig::default(),
            llm: LlmConfig {
                api_base: "http://localhost".into(),
                model: "gpt".into(),
                timeout_secs: 30,
                max_retries: 3,
                initial_backoff_ms: 500,
            },
            bridge: BridgeConfig {
                base_url: "http://localhost".into(),
                account_query_timeout_secs: 30,
                provisioning_poll_secs: 6,
                provisioning_max_attempts: 10,
            },
            telegram: TelegramConfig::default(),
            connection_manager: ConnectionManagerConfig::default(),
            router: RouterConfig::default(),
        };
        assert_eq!(config.server_address(), "127.0.0.1:9090");
    }

    #[test]
    fn router_defaults_match_the_documented_ttl_and_floor() {
        let router = RouterConfig::default();
        assert_eq!(router.subscription_cache_ttl_secs, 60);
        assert_eq!(router.min_message_length, 8);
    }

    #[test]
    fn connection_manager_defaults_match_the_documented_periods() {
        let cm = ConnectionManagerConfig::default();
        assert_eq!(cm.watchdog_period_secs, 30);
        assert_eq!(cm.reconciler_period_secs, 30);
    }
}
