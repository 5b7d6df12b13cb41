// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server name and version reported by `/System/Info/Public`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

/// A successfully authenticated identity
#[derive(Clone)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub server_info: Option<ServerInfo>,
    pub authenticated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user_id: user_id.into(),
            user_name: None,
            server_info: None,
            authenticated_at: Utc::now(),
        }
    }

    /// True once the session is at least `max_age` old
    pub fn is_expired(&self, max_age: Duration) -> bool {
        Utc::now() - self.authenticated_at >= max_age
    }
}

// The token never reaches logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("user_name", &self.user_name)
            .field("server_info", &self.server_info)
            .field("authenticated_at", &self.authenticated_at)
            .finish()
    }
}

/// Which credential source produced a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Still-valid session already held in memory
    ExistingSession,
    /// Token and user id supplied out-of-band
    PreIssuedToken,
    /// Username and password supplied out-of-band
    UsernamePassword,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::ExistingSession => "existing_session",
            CredentialSource::PreIssuedToken => "pre_issued_token",
            CredentialSource::UsernamePassword => "username_password",
        }
    }
}

/// Out-of-band credentials handed over by the configuration layer
#[derive(Clone, Default)]
pub struct CredentialSources {
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for CredentialSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSources")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Summary returned by the session status endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerInfo>,
}

/// `POST /Users/AuthenticateByName` request
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateByNameRequest<'a> {
    pub username: &'a str,
    pub pw: &'a str,
}

/// `POST /Users/AuthenticateByName` response
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticateByNameResponse {
    pub access_token: Option<String>,
    pub user: Option<UserDto>,
}

/// User record as returned by `/Users/Me` and the sign-in call
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDto {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// `GET /System/Info/Public` response
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSystemInfo {
    pub server_name: Option<String>,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_debug_redacts_token() {
        let session = Session::new("super-secret-token", "user-1");
        let debug = format!("{:?}", session);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("user-1"));
    }

    #[test]
    fn test_credential_sources_debug_redacts_secrets() {
        let sources = CredentialSources {
            access_token: Some("tok-123".to_string()),
            user_id: Some("u1".to_string()),
            username: Some("alice".to_string()),
            password: Some("hunter2".to_string()),
        };
        let debug = format!("{:?}", sources);
        assert!(!debug.contains("tok-123"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("t", "u");
        assert!(!session.is_expired(Duration::hours(24)));

        session.authenticated_at = Utc::now() - Duration::hours(25);
        assert!(session.is_expired(Duration::hours(24)));
    }

    #[test]
    fn test_authenticate_by_name_wire_format() {
        let body = serde_json::to_value(AuthenticateByNameRequest {
            username: "alice",
            pw: "secret",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"Username": "alice", "Pw": "secret"}));

        let response: AuthenticateByNameResponse = serde_json::from_value(serde_json::json!({
            "AccessToken": "abc",
            "User": {"Id": "u1", "Name": "Alice"},
            "ServerId": "srv"
        }))
        .unwrap();
        assert_eq!(response.access_token.as_deref(), Some("abc"));
        assert_eq!(response.user.unwrap().id.as_deref(), Some("u1"));
    }
}
