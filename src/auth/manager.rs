use serde_json::Value;
use std::sync::Arc;

use super::types::{
    AuthenticateByNameRequest, AuthenticateByNameResponse, PublicSystemInfo, ServerInfo, Session,
    UserDto,
};
use super::validator::TokenValidator;
use crate::error::ApiError;
use crate::http_client::JellyfinHttpClient;

pub const INVALID_LOGIN: &str = "Invalid username or password";
pub const ACCOUNT_DISABLED: &str = "User account is disabled or not allowed to sign in";
pub const INVALID_TOKEN: &str = "Invalid or expired token";
pub const USER_ID_UNRESOLVED: &str = "Unable to determine user ID for this token";

/// Authentication manager
/// Exchanges credentials with the Jellyfin server and builds sessions.
/// Holds no session state itself.
pub struct AuthManager {
    http: Arc<JellyfinHttpClient>,
    validator: TokenValidator,
}

impl AuthManager {
    pub fn new(http: Arc<JellyfinHttpClient>) -> Self {
        let validator = TokenValidator::new(http.clone());
        Self { http, validator }
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Exchange username/password for a token and the caller's identity
    pub async fn authenticate_by_name(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        tracing::info!(username = %username, "Authenticating with username/password");

        let body = serde_json::to_value(AuthenticateByNameRequest {
            username,
            pw: password,
        })
        .map_err(|e| ApiError::Internal(e.into()))?;

        let response = self
            .http
            .post_json("/Users/AuthenticateByName", None, &body)
            .await
            .map_err(|e| match e {
                ApiError::Upstream { status: 401, .. } => {
                    ApiError::InvalidCredentials(INVALID_LOGIN.to_string())
                }
                ApiError::Upstream { status: 403, .. } => {
                    ApiError::AccountDisabled(ACCOUNT_DISABLED.to_string())
                }
                other => other,
            })?;

        let data: AuthenticateByNameResponse = serde_json::from_value(response)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid response from Jellyfin server: {}", e)))?;

        let (access_token, user) = match (data.access_token, data.user) {
            (Some(token), Some(user)) if !token.is_empty() => (token, user),
            _ => {
                return Err(ApiError::Internal(anyhow::anyhow!(
                    "Invalid response from Jellyfin server"
                )))
            }
        };
        let user_id = user
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("Invalid response from Jellyfin server")))?;

        let mut session = Session::new(access_token, user_id);
        session.user_name = user.name;
        session.server_info = self.server_info().await;

        tracing::info!(
            user_id = %session.user_id,
            "✅ Authenticated with username/password"
        );
        Ok(session)
    }

    /// Build a session from a directly supplied token
    ///
    /// Without a user id the token owner is looked up through `/Users/Me`.
    pub async fn session_from_token(
        &self,
        access_token: &str,
        user_id: Option<&str>,
    ) -> Result<Session, ApiError> {
        let (user_id, user_name) = match user_id.filter(|id| !id.is_empty()) {
            Some(id) => (id.to_string(), None),
            None => {
                let user = self.current_user(access_token).await?;
                let id = user
                    .id
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| ApiError::IdentityUnresolved(USER_ID_UNRESOLVED.to_string()))?;
                (id, user.name)
            }
        };

        if !self.validator.validate(access_token, &user_id).await {
            return Err(ApiError::InvalidCredentials(INVALID_TOKEN.to_string()));
        }

        let mut session = Session::new(access_token, user_id);
        session.user_name = user_name;
        session.server_info = self.server_info().await;
        Ok(session)
    }

    /// Owner of `access_token`
    async fn current_user(&self, access_token: &str) -> Result<UserDto, ApiError> {
        let value = self
            .http
            .get_json_no_retry("/Users/Me", Some(access_token), &[])
            .await
            .map_err(|e| match e {
                ApiError::Upstream { status: 401 | 403, .. } => {
                    ApiError::InvalidCredentials(INVALID_TOKEN.to_string())
                }
                ApiError::Upstream { .. } | ApiError::Internal(_) => {
                    ApiError::IdentityUnresolved(USER_ID_UNRESOLVED.to_string())
                }
                other => other,
            })?;

        serde_json::from_value(value)
            .map_err(|_| ApiError::IdentityUnresolved(USER_ID_UNRESOLVED.to_string()))
    }

    /// Best-effort server metadata; absence is not an error
    pub async fn server_info(&self) -> Option<ServerInfo> {
        let value: Value = match self
            .http
            .get_json_no_retry("/System/Info/Public", None, &[])
            .await
        {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("Server info unavailable: {}", e);
                return None;
            }
        };

        let info: PublicSystemInfo = serde_json::from_value(value).ok()?;
        Some(ServerInfo {
            name: info.server_name.unwrap_or_else(|| "Jellyfin".to_string()),
            version: info.version.unwrap_or_else(|| "Unknown".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn manager(url: &str) -> AuthManager {
        AuthManager::new(Arc::new(JellyfinHttpClient::new(url, 2, 2, 0).unwrap()))
    }

    /// Accepts connections and never answers
    async fn hanging_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_authenticate_by_name_timeout_is_connectivity() {
        let url = hanging_server().await;
        let manager = AuthManager::new(Arc::new(JellyfinHttpClient::new(&url, 1, 1, 0).unwrap()));

        let err = manager.authenticate_by_name("alice", "pw").await.unwrap_err();

        match err {
            ApiError::Connectivity { endpoint, reason } => {
                assert_eq!(endpoint, url);
                assert_eq!(reason, "timeout");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    async fn mock_server_info(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/System/Info/Public")
            .with_status(200)
            .with_body(r#"{"ServerName":"Home","Version":"10.9.11"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_authenticate_by_name_success() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/Users/AuthenticateByName")
            .match_body(Matcher::Json(serde_json::json!({"Username": "alice", "Pw": "pw"})))
            .with_status(200)
            .with_body(r#"{"AccessToken":"tok-a","User":{"Id":"alice-id","Name":"alice"}}"#)
            .create_async()
            .await;
        mock_server_info(&mut server).await;

        let session = manager(&server.url())
            .authenticate_by_name("alice", "pw")
            .await
            .unwrap();

        assert_eq!(session.access_token, "tok-a");
        assert_eq!(session.user_id, "alice-id");
        assert_eq!(session.user_name.as_deref(), Some("alice"));
        assert_eq!(session.server_info.unwrap().version, "10.9.11");
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticate_without_server_info() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Users/AuthenticateByName")
            .with_status(200)
            .with_body(r#"{"AccessToken":"tok-a","User":{"Id":"alice-id"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/System/Info/Public")
            .with_status(500)
            .create_async()
            .await;

        let session = manager(&server.url())
            .authenticate_by_name("alice", "pw")
            .await
            .unwrap();
        assert!(session.server_info.is_none());
    }

    #[tokio::test]
    async fn test_authenticate_invalid_credentials() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Users/AuthenticateByName")
            .with_status(401)
            .create_async()
            .await;

        let err = manager(&server.url())
            .authenticate_by_name("alice", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials(_)));
        assert_eq!(err.to_string(), INVALID_LOGIN);
    }

    #[tokio::test]
    async fn test_authenticate_account_disabled() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/Users/AuthenticateByName")
            .with_status(403)
            .create_async()
            .await;

        let err = manager(&server.url())
            .authenticate_by_name("bob", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AccountDisabled(_)));
    }

    #[tokio::test]
    async fn test_authenticate_unreachable() {
        let err = manager("http://127.0.0.1:9")
            .authenticate_by_name("alice", "pw")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("http://127.0.0.1:9"));
    }

    #[tokio::test]
    async fn test_session_from_token_looks_up_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/Users/Me")
            .match_header("x-mediabrowser-token", "tok")
            .with_status(200)
            .with_body(r#"{"Id":"me-id","Name":"me"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/Users/me-id/Items")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"Items":[]}"#)
            .create_async()
            .await;
        mock_server_info(&mut server).await;

        let session = manager(&server.url())
            .session_from_token("tok", None)
            .await
            .unwrap();
        assert_eq!(session.user_id, "me-id");
        assert_eq!(session.user_name.as_deref(), Some("me"));
    }

    #[tokio::test]
    async fn test_invalid_token_distinct_from_unresolved_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/Users/Me")
            .match_header("x-mediabrowser-token", "revoked")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("GET", "/Users/Me")
            .match_header("x-mediabrowser-token", "anonymous")
            .with_status(200)
            .with_body(r#"{"Name":"no id here"}"#)
            .create_async()
            .await;

        let manager = manager(&server.url());
        let invalid = manager.session_from_token("revoked", None).await.unwrap_err();
        let unresolved = manager
            .session_from_token("anonymous", None)
            .await
            .unwrap_err();

        assert!(matches!(invalid, ApiError::InvalidCredentials(_)));
        assert!(matches!(unresolved, ApiError::IdentityUnresolved(_)));
        assert_ne!(invalid.to_string(), unresolved.to_string());
    }

    #[tokio::test]
    async fn test_session_from_token_probe_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/Users/u1/Items")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = manager(&server.url())
            .session_from_token("tok", Some("u1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_TOKEN);
    }
}
