// Credential sources, one strategy each

use async_trait::async_trait;
use std::sync::Arc;

use super::manager::AuthManager;
use super::session::SessionStore;
use super::types::{CredentialSource, Session};
use super::validator::TokenValidator;

/// Result of trying one credential source
#[derive(Debug)]
pub enum StrategyOutcome {
    /// The source produced a usable session
    Resolved(Session),
    /// The source has nothing to offer (e.g. not configured)
    NotApplicable,
    /// The source was tried and failed; the reason is for logs only
    Failed(String),
}

/// One link in the credential fallback chain
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    fn source(&self) -> CredentialSource;

    /// Never errors: failures are reported as `StrategyOutcome::Failed`
    async fn try_resolve(&self, store: &SessionStore) -> StrategyOutcome;
}

/// Reuse a still-valid in-memory session. No network.
pub struct ExistingSession;

#[async_trait]
impl CredentialStrategy for ExistingSession {
    fn source(&self) -> CredentialSource {
        CredentialSource::ExistingSession
    }

    async fn try_resolve(&self, store: &SessionStore) -> StrategyOutcome {
        match store.get().await {
            Some(session) => StrategyOutcome::Resolved(session),
            None => StrategyOutcome::NotApplicable,
        }
    }
}

/// Token plus user id supplied out-of-band, confirmed with a probe
pub struct PreIssuedToken {
    access_token: Option<String>,
    user_id: Option<String>,
    validator: TokenValidator,
}

impl PreIssuedToken {
    pub fn new(
        access_token: Option<String>,
        user_id: Option<String>,
        validator: TokenValidator,
    ) -> Self {
        Self {
            access_token,
            user_id,
            validator,
        }
    }
}

#[async_trait]
impl CredentialStrategy for PreIssuedToken {
    fn source(&self) -> CredentialSource {
        CredentialSource::PreIssuedToken
    }

    async fn try_resolve(&self, _store: &SessionStore) -> StrategyOutcome {
        let (Some(token), Some(user_id)) = (self.access_token.as_deref(), self.user_id.as_deref())
        else {
            return StrategyOutcome::NotApplicable;
        };

        if self.validator.validate(token, user_id).await {
            StrategyOutcome::Resolved(Session::new(token, user_id))
        } else {
            StrategyOutcome::Failed("configured token is invalid or expired".to_string())
        }
    }
}

/// Username and password supplied out-of-band
pub struct UsernamePassword {
    username: Option<String>,
    password: Option<String>,
    manager: Arc<AuthManager>,
}

impl UsernamePassword {
    pub fn new(
        username: Option<String>,
        password: Option<String>,
        manager: Arc<AuthManager>,
    ) -> Self {
        Self {
            username,
            password,
            manager,
        }
    }
}

#[async_trait]
impl CredentialStrategy for UsernamePassword {
    fn source(&self) -> CredentialSource {
        CredentialSource::UsernamePassword
    }

    async fn try_resolve(&self, _store: &SessionStore) -> StrategyOutcome {
        let (Some(username), Some(password)) = (self.username.as_deref(), self.password.as_deref())
        else {
            return StrategyOutcome::NotApplicable;
        };

        match self.manager.authenticate_by_name(username, password).await {
            Ok(session) => StrategyOutcome::Resolved(session),
            Err(e) => StrategyOutcome::Failed(e.to_string()),
        }
    }
}
