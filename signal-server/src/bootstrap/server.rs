use std::net::SocketAddr;

use anyhow::{Context, Result};

use crate::adapters::inbound::http::{create_router, AppState};
use crate::bootstrap::services::ServiceRegistry;
use crate::bootstrap::Application;

/// Builds the command/WebSocket router (§6) and binds the listening socket.
/// The server only exposes the small per-tenant command surface; the
/// tenant-facing REST API (onboarding, billing, auth) fronts this process
/// and is out of scope here, so no TLS termination happens at this layer.
pub async fn setup(config: crate::config::Config, registry: ServiceRegistry) -> Result<Application> {
    let bind_address = config.server_address();
    tracing::info!(%bind_address, "server will listen");

    let app_state = AppState {
        store: registry.store,
        connections: registry.connections,
        router: registry.router,
        events_tx: registry.events_tx,
    };

    let router = create_router(app_state);

    let socket_addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{bind_address}'"))?;

    Ok(Application { router, bind_address, socket_addr, logging_guard: None })
}
