//! HTTP surface: sensor state, health, metrics and action calls.

use std::sync::Arc;
use std::time::Duration;

use axum::debug_handler;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tower_http::timeout::TimeoutLayer;

use crate::actions::{ActionHandlers, ActionKind};
use crate::coordinator::Coordinator;
use crate::entities::{EntityRegistry, EntityView};
use crate::error::{ErrorKind, IntegrationError};
use crate::observability::Health;
use crate::session::Session;

pub struct AppState {
    pub session: Arc<Session>,
    pub coordinator: Arc<Coordinator>,
    pub registry: Arc<RwLock<EntityRegistry>>,
    pub actions: ActionHandlers,
    pub metrics: PrometheusHandle,
}

/// Error body: `{"error": "<kind>", "message": "..."}`.
pub struct ApiError(IntegrationError);

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        ApiError(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Reference => StatusCode::NOT_FOUND,
        ErrorKind::Auth => StatusCode::UNAUTHORIZED,
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Upstream | ErrorKind::TransientFetch => StatusCode::BAD_GATEWAY,
        ErrorKind::Config => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let body = json!({ "error": kind.as_str(), "message": self.0.to_string() });
        (status_for(kind), Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct ServiceDto {
    name: &'static str,
    schema: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReauthenticateRequest {
    mfa_code: Option<String>,
}

async fn current_health(state: &AppState) -> Health {
    let entities = state.registry.read().await.len();
    Health::evaluate(state.session.auth_state(), &state.coordinator.state(), entities)
}

#[debug_handler]
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = current_health(&state).await;
    let status = if health.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}

#[debug_handler]
async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.metrics.render();
    ([("content-type", "text/plain; version=0.0.4")], body)
}

#[debug_handler]
async fn list_sensors(State(state): State<Arc<AppState>>) -> Json<Vec<EntityView>> {
    Json(state.registry.read().await.views())
}

#[debug_handler]
async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<EntityView>, ApiError> {
    state
        .registry
        .read()
        .await
        .view(&entity_id)
        .map(Json)
        .ok_or_else(|| IntegrationError::Reference(format!("unknown entity '{entity_id}'")).into())
}

#[debug_handler]
async fn list_services() -> Json<Vec<ServiceDto>> {
    let services = ActionKind::ALL
        .into_iter()
        .map(|kind| ServiceDto {
            name: kind.as_str(),
            schema: kind.schema(),
        })
        .collect();
    Json(services)
}

#[debug_handler]
async fn call_service(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let result = state.actions.dispatch(&action, payload).await?;
    Ok(Json(result))
}

#[debug_handler]
async fn reauthenticate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReauthenticateRequest>,
) -> Result<Json<Health>, ApiError> {
    let code = req.mfa_code.map(|c| SecretString::new(c.into_boxed_str()));
    state
        .session
        .reauthenticate(code)
        .await
        .map_err(IntegrationError::from_action)?;
    // A failed refresh is reported through health.
    let _ = state.coordinator.refresh().await;
    Ok(Json(current_health(&state).await))
}

pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/sensors", get(list_sensors))
        .route("/sensors/{entity_id}", get(get_sensor))
        .route("/services", get(list_services))
        .route("/services/{action}", post(call_service))
        .route("/reauthenticate", post(reauthenticate))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(state)
}
