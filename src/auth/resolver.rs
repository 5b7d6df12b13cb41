// Ordered credential fallback chain

use std::sync::Arc;

use super::manager::AuthManager;
use super::session::SessionStore;
use super::strategies::{
    CredentialStrategy, ExistingSession, PreIssuedToken, StrategyOutcome, UsernamePassword,
};
use super::types::{CredentialSource, CredentialSources, Session};

/// Instruction returned when no source yields a session
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please use the authenticate_user tool (or set_token) to sign in, then your request will be automatically retried.";

/// Outcome of a full resolution
#[derive(Debug)]
pub enum Resolution {
    Ready {
        session: Session,
        source: CredentialSource,
    },
    NeedsAuth {
        message: String,
    },
}

/// Tries each strategy in declared order; the first success wins
pub struct CredentialResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
}

impl CredentialResolver {
    pub fn new(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self { strategies }
    }

    /// Default chain: existing session, pre-issued token, username/password
    pub fn from_sources(sources: CredentialSources, manager: Arc<AuthManager>) -> Self {
        let validator = manager.validator().clone();
        Self::new(vec![
            Box::new(ExistingSession),
            Box::new(PreIssuedToken::new(
                sources.access_token,
                sources.user_id,
                validator,
            )),
            Box::new(UsernamePassword::new(
                sources.username,
                sources.password,
                manager,
            )),
        ])
    }

    pub async fn resolve(&self, store: &SessionStore) -> Resolution {
        for strategy in &self.strategies {
            let source = strategy.source();
            match strategy.try_resolve(store).await {
                StrategyOutcome::Resolved(session) => {
                    tracing::debug!(source = source.as_str(), "Credentials resolved");
                    return Resolution::Ready { session, source };
                }
                StrategyOutcome::NotApplicable => {
                    tracing::trace!(source = source.as_str(), "Credential source not applicable");
                }
                StrategyOutcome::Failed(reason) => {
                    tracing::warn!(
                        source = source.as_str(),
                        "⚠️  Credential source failed: {}",
                        reason
                    );
                }
            }
        }

        Resolution::NeedsAuth {
            message: AUTH_REQUIRED_MESSAGE.to_string(),
        }
    }

    /// Sources in the order they are tried
    pub fn order(&self) -> Vec<CredentialSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }
}
