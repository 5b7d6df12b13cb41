// Single active session with lazy expiry

use chrono::Duration;
use tokio::sync::RwLock;

use super::types::{Session, SessionInfo};

/// Sessions older than this are treated as absent
pub const DEFAULT_SESSION_MAX_AGE_HOURS: i64 = 24;

/// Holds at most one session
///
/// `get` hides an expired session but does not evict it; the next `set`
/// replaces it wholesale.
pub struct SessionStore {
    session: RwLock<Option<Session>>,
    max_age: Duration,
}

impl SessionStore {
    pub fn new(max_age: Duration) -> Self {
        Self {
            session: RwLock::new(None),
            max_age,
        }
    }

    /// Current session, if one is held and still inside the expiry window
    pub async fn get(&self) -> Option<Session> {
        let session = self.session.read().await;
        match session.as_ref() {
            Some(s) if !s.is_expired(self.max_age) => Some(s.clone()),
            Some(s) => {
                tracing::debug!(
                    user_id = %s.user_id,
                    authenticated_at = %s.authenticated_at.to_rfc3339(),
                    "Stored session expired"
                );
                None
            }
            None => None,
        }
    }

    /// Replace whatever is held with `session`
    pub async fn set(&self, session: Session) {
        let mut slot = self.session.write().await;
        *slot = Some(session);
    }

    pub async fn clear(&self) {
        let mut slot = self.session.write().await;
        *slot = None;
    }

    /// Status summary that never exposes the token
    pub async fn info(&self) -> SessionInfo {
        match self.get().await {
            Some(session) => SessionInfo {
                authenticated: true,
                user_id: Some(session.user_id),
                user_name: session.user_name,
                server: session.server_info,
            },
            None => SessionInfo {
                authenticated: false,
                user_id: None,
                user_name: None,
                server: None,
            },
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_SESSION_MAX_AGE_HOURS))
    }
}
