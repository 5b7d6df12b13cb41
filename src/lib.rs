// Jellyfin MCP - Library root for testing

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http_client;
pub mod library;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod service_spec;
pub mod tools;
