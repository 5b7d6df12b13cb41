use anyhow::{Context, Result};
use reqwest::{Client, Method, Request, Response};
use serde_json::Value;
use std::time::Duration;

use crate::error::ApiError;

/// Client identification sent with every Jellyfin request
const CLIENT_AUTH_HEADER: &str = r#"MediaBrowser Client="Jellyfin MCP", Device="MCP Server", DeviceId="jellyfin-mcp-001", Version="0.1.0""#;

/// Header carrying the bearer token
const TOKEN_HEADER: &str = "X-MediaBrowser-Token";

/// HTTP client for the Jellyfin API with retry logic
pub struct JellyfinHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Server root without trailing slash
    base_url: String,

    /// Maximum number of retries for idempotent reads
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl JellyfinHttpClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        connect_timeout: u64,
        request_timeout: u64,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            base_delay_ms: 1000, // 1 second base delay
        })
    }

    /// Server root this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON document, retrying 429/5xx and network failures
    pub async fn get_json(
        &self,
        path: &str,
        token: Option<&str>,
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let request = self.build(Method::GET, path, token, query, None)?;
        let response = self.execute(request, true).await?;
        parse_json(response).await
    }

    /// GET a JSON document without retries
    ///
    /// Used by the probe and identity lookups so a blocked call is bounded by
    /// a single request timeout.
    pub async fn get_json_no_retry(
        &self,
        path: &str,
        token: Option<&str>,
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let request = self.build(Method::GET, path, token, query, None)?;
        let response = self.execute(request, false).await?;
        parse_json(response).await
    }

    /// POST a JSON body. Never retried.
    pub async fn post_json(
        &self,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let request = self.build(Method::POST, path, token, &[], Some(body))?;
        let response = self.execute(request, false).await?;
        parse_json(response).await
    }

    fn build(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Request, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .client
            .request(method, &url)
            .header("X-Emby-Authorization", CLIENT_AUTH_HEADER)
            .header("Accept", "application/json");

        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder
            .build()
            .with_context(|| format!("Failed to build request for {}", path))
            .map_err(ApiError::Internal)
    }

    /// Execute a request, optionally with retry logic
    /// Retries:
    /// - 429: exponential backoff
    /// - 5xx: exponential backoff
    /// - network errors: exponential backoff
    async fn execute(&self, request: Request, enable_retry: bool) -> Result<Response, ApiError> {
        let max_retries = if enable_retry { self.max_retries } else { 0 };
        let mut attempt = 0;

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(
            method = %method,
            url = %url,
            "Sending HTTP request"
        );

        loop {
            let req = request.try_clone().ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!("Request body is not cloneable"))
            })?;

            match self.client.execute(req).await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        tracing::debug!(status = %status, "Request successful");
                        return Ok(response);
                    }

                    if matches!(status.as_u16(), 429 | 500..=599) && attempt < max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tracing::warn!(
                            "Received {}, retrying after {}ms (attempt {}/{})",
                            status,
                            delay,
                            attempt + 1,
                            max_retries
                        );

                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    // Non-retryable error or max retries exceeded
                    let error_text = response.text().await.unwrap_or_default();

                    tracing::warn!(
                        status = status.as_u16(),
                        url = %url.path(),
                        attempt = attempt + 1,
                        "Jellyfin request failed with error response"
                    );
                    return Err(ApiError::Upstream {
                        status: status.as_u16(),
                        message: error_text,
                    });
                }

                Err(e) => {
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else if e.is_body() {
                        "body_error"
                    } else {
                        "unknown"
                    };

                    tracing::warn!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url.path(),
                        attempt = attempt + 1,
                        "HTTP request error"
                    );

                    if attempt < max_retries {
                        let delay = self.calculate_backoff_delay(attempt);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    if e.is_timeout() || e.is_connect() || e.is_request() {
                        return Err(ApiError::Connectivity {
                            endpoint: self.base_url.clone(),
                            reason: error_kind.to_string(),
                        });
                    }

                    return Err(ApiError::Internal(anyhow::anyhow!(
                        "HTTP request failed: {} (kind: {})",
                        e,
                        error_kind
                    )));
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_backoff_delay(&self, attempt: u32) -> u64 {
        // base_delay * 2^attempt plus up to 10% jitter
        let delay = self.base_delay_ms * 2_u64.pow(attempt);
        let jitter = (delay as f64 * 0.1 * rand::random::<f64>()) as u64;
        delay + jitter
    }
}

/// Decode a response body as JSON; an empty body decodes to `null`
async fn parse_json(response: Response) -> Result<Value, ApiError> {
    let body = response
        .text()
        .await
        .context("Failed to read Jellyfin response body")?;

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body)
        .context("Failed to parse Jellyfin response")
        .map_err(ApiError::Internal)
}

/// Percent-encode a single path segment
pub fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_backoff_calculation() {
        let client = JellyfinHttpClient::new("http://localhost:8096", 5, 10, 3).unwrap();

        let delay0 = client.calculate_backoff_delay(0);
        let delay1 = client.calculate_backoff_delay(1);
        let delay2 = client.calculate_backoff_delay(2);

        assert!((1000..=1100).contains(&delay0));
        assert!((2000..=2200).contains(&delay1));
        assert!((4000..=4400).contains(&delay2));
    }

    #[test]
    fn test_base_url_trailing_slashes_trimmed() {
        let client = JellyfinHttpClient::new("http://jf.local:8096///", 5, 10, 0).unwrap();
        assert_eq!(client.base_url(), "http://jf.local:8096");
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(segment("abc123"), "abc123");
        assert_eq!(segment("a b/c"), "a%20b%2Fc");
    }

    #[tokio::test]
    async fn test_get_json_sends_token_and_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Users/u1/Items")
            .match_header("x-mediabrowser-token", "tok")
            .match_header("x-emby-authorization", Matcher::Regex("Jellyfin MCP".into()))
            .match_query(Matcher::UrlEncoded("Limit".into(), "1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Items":[],"TotalRecordCount":0}"#)
            .create_async()
            .await;

        let client = JellyfinHttpClient::new(&server.url(), 5, 10, 0).unwrap();
        let value = client
            .get_json(
                "/Users/u1/Items",
                Some("tok"),
                &[("Limit".to_string(), "1".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(value["TotalRecordCount"], 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Users/AuthenticateByName")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let client = JellyfinHttpClient::new(&server.url(), 5, 10, 0).unwrap();
        let err = client
            .post_json("/Users/AuthenticateByName", None, &json!({}))
            .await
            .unwrap_err();

        match err {
            ApiError::Upstream { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_failure() {
        // Port 9 (discard) on loopback is closed on test machines
        let client = JellyfinHttpClient::new("http://127.0.0.1:9", 2, 2, 0).unwrap();
        let err = client.get_json("/System/Info/Public", None, &[]).await.unwrap_err();

        match err {
            ApiError::Connectivity { endpoint, .. } => {
                assert_eq!(endpoint, "http://127.0.0.1:9");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/Empty")
            .with_status(204)
            .create_async()
            .await;

        let client = JellyfinHttpClient::new(&server.url(), 5, 10, 0).unwrap();
        let value = client.get_json("/Empty", None, &[]).await.unwrap();
        assert!(value.is_null());
    }
}
