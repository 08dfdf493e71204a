//! Minimal command/WebSocket surface (§6). The bulk of the tenant-facing
//! REST API (onboarding, multi-account CRUD, stats, auth) is external to the
//! core; this module only serializes the handful of inbound commands the
//! core demands per tenant, plus a WebSocket relay of bus events.

pub mod dtos;
pub mod error;
pub mod websocket;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{post, get};
use axum::{Json, Router};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::SignalRouter;
use crate::application::connection_manager::ConnectionManager;
use crate::ports::SettingsStore;

use dtos::{ConfirmSignalRequest, ExecuteCorrectedSignalRequest, RejectSignalRequest};
use error::ProblemDetails;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SettingsStore>,
    pub connections: Arc<ConnectionManager>,
    pub router: Arc<SignalRouter>,
    pub events_tx: broadcast::Sender<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/tenants/:tenant_id/connect", post(connect_user))
        .route("/api/tenants/:tenant_id/disconnect", post(disconnect_user))
        .route("/api/tenants/:tenant_id/settings/reload", post(reload_user_settings))
        .route("/api/tenants/:tenant_id/signals/:signal_id/confirm", post(confirm_signal))
        .route("/api/tenants/:tenant_id/signals/:signal_id/reject", post(reject_signal))
        .route("/api/tenants/:tenant_id/signals/:signal_id/execute-corrected", post(execute_corrected_signal))
        .route("/ws", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn connect_user(State(state): State<AppState>, Path(tenant_id): Path<String>) -> Result<(), ProblemDetails> {
    state.connections.connect_user(&tenant_id).await.map_err(|err| ProblemDetails::validation_error(err.to_string()))
}

async fn disconnect_user(State(state): State<AppState>, Path(tenant_id): Path<String>) -> Result<(), ProblemDetails> {
    state.connections.disconnect_user(&tenant_id).await.map_err(|err| ProblemDetails::internal_error(err.to_string()))
}

async fn reload_user_settings(State(state): State<AppState>, Path(tenant_id): Path<String>) -> Result<(), ProblemDetails> {
    state.connections.reload_user_settings(&tenant_id).await.map_err(|err| ProblemDetails::validation_error(err.to_string()))
}

async fn confirm_signal(
    State(state): State<AppState>,
    Path((tenant_id, signal_id)): Path<(String, String)>,
    Json(body): Json<ConfirmSignalRequest>,
) -> Result<(), ProblemDetails> {
    state
        .router
        .confirm_signal(&tenant_id, &signal_id, body.lot_override)
        .await
        .map_err(|err| ProblemDetails::internal_error(err.to_string()))
}

async fn reject_signal(
    State(state): State<AppState>,
    Path((tenant_id, signal_id)): Path<(String, String)>,
    Json(body): Json<RejectSignalRequest>,
) -> Result<(), ProblemDetails> {
    state
        .router
        .reject_signal(&tenant_id, &signal_id, &body.reason)
        .await
        .map_err(|err| ProblemDetails::internal_error(err.to_string()))
}

async fn execute_corrected_signal(
    State(state): State<AppState>,
    Path((tenant_id, signal_id)): Path<(String, String)>,
    Json(body): Json<ExecuteCorrectedSignalRequest>,
) -> Result<(), ProblemDetails> {
    state
        .router
        .execute_corrected_signal(&tenant_id, &signal_id, body.direction)
        .await
        .map_err(|err| ProblemDetails::internal_error(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::application::InProcessEventBus;
    use crate::ports::outbound::{MockBridgeGateway, MockLlmClient, MockTelegramSession};
    use crate::ports::MockSettingsStore;
    use std::time::Duration;

    fn test_state() -> AppState {
        let mut mock_store = MockSettingsStore::new();
        mock_store.expect_get_tenant().returning(|_| Ok(None));
        let store: Arc<dyn SettingsStore> = Arc::new(mock_store);
        let bridge = Arc::new(MockBridgeGateway::new());
        let telegram = Arc::new(MockTelegramSession::new());
        let connections = ConnectionManager::new(store.clone(), bridge, telegram, Duration::from_secs(30), Duration::from_secs(30));
        let llm = Arc::new(MockLlmClient::new());
        let events = Arc::new(InProcessEventBus::new());
        let router = Arc::new(SignalRouter::new(store.clone(), llm, events, connections.clone(), &crate::config::RouterConfig::default()));
        let (events_tx, _) = broadcast::channel(16);
        AppState { store, connections, router, events_tx }
    }

    #[tokio::test]
    async fn connect_for_an_unknown_tenant_returns_a_problem_response() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().method("POST").uri("/api/tenants/t1/connect").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
