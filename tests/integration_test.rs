// Integration tests for Jellyfin MCP
//
// These tests drive the full HTTP stack against a mock Jellyfin server:
// routing, middleware, argument parsing, the deferred-retry flow and the
// error response format.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mockito::Matcher;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tower::ServiceExt;

use jellyfin_mcp::{
    auth::{CredentialSources, PendingRequestSlot, SessionStore},
    dispatcher::Dispatcher,
    http_client::JellyfinHttpClient,
    metrics::MetricsCollector,
    routes::{self, AppState},
    service_spec::ServiceSpec,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn create_test_app_state(base_url: &str, sources: CredentialSources, spec_path: &str) -> AppState {
    let http_client = Arc::new(
        JellyfinHttpClient::new(base_url, 2, 5, 0).expect("Failed to create HTTP client"),
    );
    let dispatcher = Arc::new(Dispatcher::new(
        http_client,
        sources,
        Arc::new(SessionStore::default()),
        Arc::new(PendingRequestSlot::new()),
    ));

    AppState {
        dispatcher,
        service_spec: Arc::new(ServiceSpec::new(spec_path)),
        metrics: Arc::new(MetricsCollector::new()),
    }
}

fn build_test_app(base_url: &str) -> Router {
    routes::build_router(create_test_app_state(
        base_url,
        CredentialSources::default(),
        "/nonexistent/jellyfin-mcp.spec.yaml",
    ))
}

/// Helper to parse JSON response body
async fn parse_json_body(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, parse_json_body(response.into_body()).await)
}

// ==================================================================================================
// Health Check Tests
// ==================================================================================================

#[tokio::test]
async fn test_root_endpoint() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "GET", "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Jellyfin MCP is running");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

// ==================================================================================================
// Catalog Tests
// ==================================================================================================

#[tokio::test]
async fn test_tool_catalog() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "GET", "/tools", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"list_items"));
    assert!(names.contains(&"authenticate_user"));
    assert!(names.contains(&"set_token"));
}

#[tokio::test]
async fn test_resource_list() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "GET", "/resources", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resources"][0]["uri"], "jellyfin://snapshot");
}

// ==================================================================================================
// Deferred Retry Tests
// ==================================================================================================

#[tokio::test]
async fn test_blocked_call_returns_auth_required() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(
        &app,
        "POST",
        "/tools/list_items",
        Some(json!({"view": "Movies", "limit": 10})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "authentication_required");
    assert_eq!(
        body["error"]["actions"],
        json!(["authenticate_user", "set_token"])
    );
}

#[tokio::test]
async fn test_sign_in_replays_blocked_call() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/Users/AuthenticateByName")
        .with_status(200)
        .with_body(r#"{"AccessToken":"alice-token","User":{"Id":"alice-id","Name":"alice"}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/System/Info/Public")
        .with_status(200)
        .with_body(r#"{"ServerName":"Home","Version":"10.9.11"}"#)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/Users/alice-id/Items")
        .match_header("x-mediabrowser-token", "alice-token")
        .match_query(Matcher::UrlEncoded("IncludeItemTypes".into(), "Movie".into()))
        .with_status(200)
        .with_body(r#"{"Items":[{"Id":"m1","Name":"Heat","Type":"Movie"}],"TotalRecordCount":1}"#)
        .expect(2)
        .create_async()
        .await;

    let app = build_test_app(&server.url());

    let (status, _) = call(
        &app,
        "POST",
        "/tools/list_items",
        Some(json!({"view": "Movies", "limit": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        "POST",
        "/tools/authenticate_user",
        Some(json!({"username": "alice", "password": "secret"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["user"]["name"], "alice");
    assert_eq!(body["access_token"], "alice-token");
    assert_eq!(body["retried_request"]["tool"], "list_items");
    assert_eq!(body["retried_request"]["result"]["items"][0]["Name"], "Heat");

    // The session now serves calls directly
    let (status, body) = call(
        &app,
        "POST",
        "/tools/list_items",
        Some(json!({"view": "Movies", "limit": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (_, session) = call(&app, "GET", "/session", None).await;
    assert_eq!(session["authenticated"], true);
    assert_eq!(session["user_id"], "alice-id");
    assert!(session.get("access_token").is_none());

    listing.assert_async().await;
}

#[tokio::test]
async fn test_wrong_password_reports_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/Users/AuthenticateByName")
        .with_status(401)
        .create_async()
        .await;

    let app = build_test_app(&server.url());

    let (status, body) = call(
        &app,
        "POST",
        "/tools/authenticate_user",
        Some(json!({"username": "alice", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ok": false, "error": "Invalid username or password"}));

    let (_, session) = call(&app, "GET", "/session", None).await;
    assert_eq!(session["authenticated"], false);
}

#[tokio::test]
async fn test_sign_out_forgets_session() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Users/Me")
        .with_status(200)
        .with_body(r#"{"Id":"me","Name":"Me"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/Users/me/Items")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"Items":[]}"#)
        .create_async()
        .await;

    let app = build_test_app(&server.url());

    let (_, body) = call(&app, "POST", "/tools/set_token", Some(json!({"access_token": "tok"}))).await;
    assert_eq!(body["ok"], true);

    let (status, _) = call(&app, "DELETE", "/session", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "POST", "/tools/next_up", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_configured_credentials_skip_auth_prompt() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/Users/env-user/Items")
        .match_query(Matcher::UrlEncoded("Limit".into(), "1".into()))
        .with_status(200)
        .with_body(r#"{"Items":[]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/Items/abc/PlaybackInfo")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"MediaSources":[{"Container":"mp4","SupportsDirectStream":true}]}"#)
        .create_async()
        .await;

    let app = routes::build_router(create_test_app_state(
        &server.url(),
        CredentialSources {
            access_token: Some("env-token".to_string()),
            user_id: Some("env-user".to_string()),
            ..Default::default()
        },
        "/nonexistent.yaml",
    ));

    let (status, body) = call(
        &app,
        "POST",
        "/tools/get_stream_info",
        Some(json!({"item_id": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"can_direct_play": true, "container": "mp4"}));
}

// ==================================================================================================
// Error Format Tests
// ==================================================================================================

#[tokio::test]
async fn test_unknown_tool() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "POST", "/tools/delete_everything", Some(json!({}))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "unknown_tool");
}

#[tokio::test]
async fn test_invalid_arguments() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "POST", "/tools/list_items", Some(json!({"limit": 0}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "validation_error");
}

#[tokio::test]
async fn test_upstream_unreachable() {
    let app = routes::build_router(create_test_app_state(
        "http://127.0.0.1:9",
        CredentialSources::default(),
        "/nonexistent.yaml",
    ));

    let (status, body) = call(
        &app,
        "POST",
        "/tools/authenticate_user",
        Some(json!({"username": "alice", "password": "pw"})),
    )
    .await;

    // explicit auth reports failures in-band
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("http://127.0.0.1:9"));
}

// ==================================================================================================
// Service Description and Metrics Tests
// ==================================================================================================

#[tokio::test]
async fn test_spec_routes() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"info:\n  title: Jellyfin MCP\ntools:\n  - name: list_items\n")
        .unwrap();
    file.flush().unwrap();

    let app = routes::build_router(create_test_app_state(
        "http://127.0.0.1:9",
        CredentialSources::default(),
        file.path().to_str().unwrap(),
    ));

    let (status, body) = call(&app, "GET", "/spec", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys"], json!(["info", "tools"]));
    assert_eq!(body["etag"].as_str().unwrap().len(), 16);

    let (status, body) = call(&app, "GET", "/spec/tools/0/name", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("list_items"));

    let (status, body) = call(&app, "GET", "/spec/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn test_metrics_count_calls() {
    let app = build_test_app("http://127.0.0.1:9");

    call(&app, "POST", "/tools/next_up", None).await;
    call(&app, "POST", "/tools/next_up", None).await;

    let (status, body) = call(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tools"]["next_up"]["calls"], 2);
    assert_eq!(body["errors_by_type"]["authentication_required"], 2);
    assert_eq!(body["active_calls"], 0);
}

#[tokio::test]
async fn test_snapshot_requires_sign_in() {
    let app = build_test_app("http://127.0.0.1:9");

    let (status, body) = call(&app, "GET", "/resources/snapshot", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "authentication_required");
}
