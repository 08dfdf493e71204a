use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;

pub mod logging;
pub mod server;
pub mod services;

pub struct Application {
    pub router: Router,
    pub bind_address: String,
    pub socket_addr: SocketAddr,
    /// Holds the non-blocking file-logging writer thread alive; dropping it
    /// stops log delivery, so callers must keep it for the process lifetime.
    pub logging_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

pub async fn setup() -> Result<Application> {
    let config = load_config()?;
    let logging_guard = logging::init(&config.logging);
    let service_registry = services::setup(&config).await?;
    let mut app = server::setup(config, service_registry).await?;
    app.logging_guard = logging_guard;
    Ok(app)
}

/// Config directory defaults to alongside the binary, overridable with
/// `CONFIG_DIR` for containerized deployments.
fn load_config() -> Result<crate::config::Config> {
    use crate::config::Config;

    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_string_lossy().into_owned()))
            .unwrap_or_else(|| ".".to_string())
    });
    let config_base = format!("{config_dir}/config");

    Config::from_file(&config_base).with_context(|| format!("failed to load configuration from {config_base}"))
}
