// Tool dispatch with deferred retry
//
// Library operations resolve credentials first. When nothing yields a session
// the call is parked in the pending slot and the caller is told to
// authenticate; the next successful authenticate_user or set_token replays it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::auth::{
    AuthManager, CredentialResolver, CredentialSource, CredentialSources, PendingRequestSlot,
    Resolution, Session, SessionInfo, SessionStore,
};
use crate::error::ApiError;
use crate::http_client::JellyfinHttpClient;
use crate::library::{fetch_snapshot, JellyfinClient, LibrarySnapshot, Operation};

pub const AUTHENTICATE_USER: &str = "authenticate_user";
pub const SET_TOKEN: &str = "set_token";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetriedRequest {
    pub tool: String,
    pub result: Value,
}

/// Result of an explicit authentication action
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AuthOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AuthUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retried_request: Option<RetriedRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    fn success(session: &Session) -> Self {
        Self {
            ok: true,
            user: Some(AuthUser {
                id: session.user_id.clone(),
                name: session
                    .user_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            }),
            access_token: Some(session.access_token.clone()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuthenticateUserInput {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SetTokenInput {
    access_token: Option<String>,
    user_id: Option<String>,
}

/// Routes tool calls and owns the retry protocol
pub struct Dispatcher {
    http: Arc<JellyfinHttpClient>,
    auth: Arc<AuthManager>,
    resolver: CredentialResolver,
    store: Arc<SessionStore>,
    pending: Arc<PendingRequestSlot>,
}

impl Dispatcher {
    pub fn new(
        http: Arc<JellyfinHttpClient>,
        sources: CredentialSources,
        store: Arc<SessionStore>,
        pending: Arc<PendingRequestSlot>,
    ) -> Self {
        let auth = Arc::new(AuthManager::new(http.clone()));
        let resolver = CredentialResolver::from_sources(sources, auth.clone());
        Self {
            http,
            auth,
            resolver,
            store,
            pending,
        }
    }

    /// Invoke a tool by name
    pub async fn invoke(&self, tool: &str, args: Value) -> Result<Value, ApiError> {
        match tool {
            AUTHENTICATE_USER => to_json(self.authenticate_user(&args).await),
            SET_TOKEN => to_json(self.set_token(&args).await),
            name if Operation::is_library_operation(name) => self.dispatch(name, args).await,
            other => Err(ApiError::UnknownOperation(other.to_string())),
        }
    }

    /// Run a library operation, parking it when no credentials are available
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<Value, ApiError> {
        // Malformed calls fail here and are never parked
        let operation = Operation::parse(name, &args)?;

        let session = match self.resolve().await {
            Some(session) => session,
            None => {
                self.pending.store(name, args).await;
                tracing::info!(tool = %name, "🔒 Authentication required, request parked");
                return Err(ApiError::AuthenticationRequired(
                    crate::auth::AUTH_REQUIRED_MESSAGE.to_string(),
                ));
            }
        };

        tracing::debug!(tool = %name, user_id = %session.user_id, "Executing tool");
        let client = JellyfinClient::new(&self.http, &session);
        operation.execute(&client).await
    }

    /// Sign in with username and password, then replay any parked request
    pub async fn authenticate_user(&self, args: &Value) -> AuthOutcome {
        let input: AuthenticateUserInput = serde_json::from_value(args.clone()).unwrap_or_default();
        let (Some(username), Some(password)) = (
            input.username.filter(|u| !u.is_empty()),
            input.password.filter(|p| !p.is_empty()),
        ) else {
            return AuthOutcome::failure("Username and password are required");
        };

        match self.auth.authenticate_by_name(&username, &password).await {
            Ok(session) => self.complete_authentication(session).await,
            Err(e) => {
                tracing::warn!(username = %username, "Sign-in failed: {}", e);
                AuthOutcome::failure(e.to_string())
            }
        }
    }

    /// Install a directly supplied token, then replay any parked request
    pub async fn set_token(&self, args: &Value) -> AuthOutcome {
        let input: SetTokenInput = serde_json::from_value(args.clone()).unwrap_or_default();
        let Some(access_token) = input.access_token.filter(|t| !t.is_empty()) else {
            return AuthOutcome::failure("Access token is required");
        };

        match self
            .auth
            .session_from_token(&access_token, input.user_id.as_deref())
            .await
        {
            Ok(session) => self.complete_authentication(session).await,
            Err(e) => {
                tracing::warn!("Token rejected: {}", e);
                AuthOutcome::failure(e.to_string())
            }
        }
    }

    async fn complete_authentication(&self, session: Session) -> AuthOutcome {
        self.store.set(session.clone()).await;
        tracing::info!(user_id = %session.user_id, "✅ Session established");

        let mut outcome = AuthOutcome::success(&session);
        let Some(pending) = self.pending.take().await else {
            return outcome;
        };

        tracing::info!(tool = %pending.operation_name, "🔄 Retrying parked request");
        // Runs against the new session directly so the replay cannot park itself again
        let retry: Result<Value, String> =
            match Operation::parse(&pending.operation_name, &pending.arguments) {
                Ok(operation) => {
                    let client = JellyfinClient::new(&self.http, &session);
                    operation.execute(&client).await.map_err(|e| e.to_string())
                }
                Err(ApiError::UnknownOperation(name)) => {
                    Err(format!("Cannot retry unknown tool: {}", name))
                }
                Err(e) => Err(e.to_string()),
            };

        match retry {
            Ok(result) => {
                outcome.retried_request = Some(RetriedRequest {
                    tool: pending.operation_name,
                    result,
                });
            }
            Err(message) => {
                tracing::warn!(tool = %pending.operation_name, "Retry failed: {}", message);
                outcome.retry_error = Some(message);
            }
        }
        outcome
    }

    /// Library snapshot resource; never parks a request
    pub async fn snapshot(&self) -> Result<LibrarySnapshot, ApiError> {
        let session = self.resolve().await.ok_or_else(|| {
            ApiError::AuthenticationRequired(crate::auth::AUTH_REQUIRED_MESSAGE.to_string())
        })?;
        let client = JellyfinClient::new(&self.http, &session);
        fetch_snapshot(&client).await
    }

    pub async fn session_info(&self) -> SessionInfo {
        self.store.info().await
    }

    /// Drop the active session and any parked request
    pub async fn sign_out(&self) {
        self.store.clear().await;
        self.pending.clear().await;
        tracing::info!("Signed out");
    }

    /// Resolve once at startup so configured credentials are checked early
    pub async fn warm_up(&self) {
        match self.resolve().await {
            Some(session) => {
                tracing::info!(user_id = %session.user_id, "✅ Credentials ready");
            }
            None => {
                tracing::info!("No usable credentials yet; waiting for authenticate_user or set_token");
            }
        }
    }

    /// Run the fallback chain, installing any newly produced session
    async fn resolve(&self) -> Option<Session> {
        match self.resolver.resolve(&self.store).await {
            Resolution::Ready { session, source } => {
                if source != CredentialSource::ExistingSession {
                    tracing::info!(source = source.as_str(), "Installing resolved session");
                    self.store.set(session.clone()).await;
                }
                Some(session)
            }
            Resolution::NeedsAuth { .. } => None,
        }
    }
}

fn to_json(outcome: AuthOutcome) -> Result<Value, ApiError> {
    serde_json::to_value(outcome).map_err(|e| ApiError::Internal(e.into()))
}
