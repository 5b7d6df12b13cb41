// CORS and request logging middleware

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

/// Short id attached to every request's log lines
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Log each request with a short request id and its latency
pub async fn request_log_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    tracing::debug!(
        request_id = %request_id,
        status = %response.status(),
        "{} {} ({:.1} ms)",
        method,
        path,
        elapsed_ms
    );
    response
}

/// Create CORS middleware layer
///
/// Configures CORS to allow all origins, methods, and headers.
/// Handles OPTIONS preflight requests automatically.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
