// Token probe

use std::sync::Arc;

use crate::http_client::{segment, JellyfinHttpClient};

/// Confirms a token is accepted by issuing a single-item page fetch
#[derive(Clone)]
pub struct TokenValidator {
    http: Arc<JellyfinHttpClient>,
}

impl TokenValidator {
    pub fn new(http: Arc<JellyfinHttpClient>) -> Self {
        Self { http }
    }

    /// Pure predicate: any failure, including timeouts, yields `false`
    pub async fn validate(&self, token: &str, user_id: &str) -> bool {
        let path = format!("/Users/{}/Items", segment(user_id));
        let query = [("Limit".to_string(), "1".to_string())];

        match self.http.get_json_no_retry(&path, Some(token), &query).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(user_id = %user_id, error = %e, "Token probe rejected");
                false
            }
        }
    }
}
