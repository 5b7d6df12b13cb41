use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::SessionInfo;
use crate::dispatcher::Dispatcher;
use crate::error::ApiError;
use crate::library::LibrarySnapshot;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::middleware;
use crate::service_spec::{ServiceSpec, SpecIndex};
use crate::tools;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub service_spec: Arc<ServiceSpec>,
    pub metrics: Arc<MetricsCollector>,
}

/// Guard to ensure active calls are decremented on drop
struct CallGuard {
    metrics: Arc<MetricsCollector>,
    start_time: Instant,
    tool: String,
    completed: bool,
}

impl CallGuard {
    fn new(metrics: Arc<MetricsCollector>, tool: &str) -> Self {
        metrics.record_call_start();
        Self {
            metrics,
            start_time: Instant::now(),
            tool: tool.to_string(),
            completed: false,
        }
    }

    fn complete(&mut self, error_type: Option<&str>) {
        if !self.completed {
            let latency_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
            self.metrics
                .record_call_end(&self.tool, latency_ms, error_type);
            self.completed = true;
        }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.completed {
            // Cancelled mid-flight
            self.metrics.record_call_abandoned();
        }
    }
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Tool, resource, session and description routes
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/tools", get(list_tools_handler))
        .route("/tools/:name", post(call_tool_handler))
        .route("/resources", get(list_resources_handler))
        .route("/resources/snapshot", get(snapshot_handler))
        .route("/session", get(session_handler).delete(sign_out_handler))
        .route("/spec", get(spec_index_handler))
        .route("/spec/*section", get(spec_section_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Build the application with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(api_routes(state))
        .layer(middleware::cors_layer())
        .layer(axum::middleware::from_fn(middleware::request_log_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Jellyfin MCP is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// GET /tools - Tool catalog
async fn list_tools_handler() -> Json<Value> {
    Json(json!({ "tools": tools::catalog() }))
}

/// POST /tools/:name - Invoke a tool
///
/// The body is the tool's JSON arguments; an empty body means `{}`.
async fn call_tool_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    tracing::info!(tool = %name, "Tool call");
    let mut guard = CallGuard::new(state.metrics.clone(), &name);

    let result = match parse_arguments(&body) {
        Ok(args) => state.dispatcher.invoke(&name, args).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(value) => {
            guard.complete(None);
            Ok(Json(value))
        }
        Err(e) => {
            guard.complete(Some(e.kind()));
            if !e.is_authentication_required() {
                tracing::warn!(tool = %name, error_type = e.kind(), "Tool call failed: {}", e);
            }
            Err(e)
        }
    }
}

fn parse_arguments(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::ValidationError(format!("Invalid JSON arguments: {}", e)))
}

/// GET /resources - Resource list
async fn list_resources_handler() -> Json<Value> {
    Json(json!({ "resources": tools::resources() }))
}

/// GET /resources/snapshot - Library snapshot
async fn snapshot_handler(
    State(state): State<AppState>,
) -> Result<Json<LibrarySnapshot>, ApiError> {
    let snapshot = state.dispatcher.snapshot().await.map_err(|e| {
        state.metrics.record_error(e.kind());
        e
    })?;
    Ok(Json(snapshot))
}

/// GET /session - Current session, without the token
async fn session_handler(State(state): State<AppState>) -> Json<SessionInfo> {
    Json(state.dispatcher.session_info().await)
}

/// DELETE /session - Sign out
async fn sign_out_handler(State(state): State<AppState>) -> Json<Value> {
    state.dispatcher.sign_out().await;
    Json(json!({ "ok": true }))
}

/// GET /spec - Top-level keys and etag of the service description
async fn spec_index_handler(State(state): State<AppState>) -> Result<Json<SpecIndex>, ApiError> {
    Ok(Json(state.service_spec.index()?))
}

/// GET /spec/*section - One section of the service description
async fn spec_section_handler(
    State(state): State<AppState>,
    Path(section): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.service_spec.section(&section)?))
}

/// GET /metrics - Tool call metrics
async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
