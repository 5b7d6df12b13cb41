// Authentication module
// Credential resolution, the active session and the pending-request slot

mod manager;
mod pending;
mod resolver;
mod session;
mod strategies;
mod types;
mod validator;

pub use manager::{
    AuthManager, ACCOUNT_DISABLED, INVALID_LOGIN, INVALID_TOKEN, USER_ID_UNRESOLVED,
};
pub use pending::{PendingRequest, PendingRequestSlot};
pub use resolver::{CredentialResolver, Resolution, AUTH_REQUIRED_MESSAGE};
pub use session::{SessionStore, DEFAULT_SESSION_MAX_AGE_HOURS};
pub use strategies::{
    CredentialStrategy, ExistingSession, PreIssuedToken, StrategyOutcome, UsernamePassword,
};
pub use types::{CredentialSource, CredentialSources, ServerInfo, Session, SessionInfo};
pub use validator::TokenValidator;
