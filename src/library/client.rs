// Authenticated reads against a user's library

use serde_json::Value;
use std::sync::Arc;

use super::params::Query;
use crate::auth::Session;
use crate::error::ApiError;
use crate::http_client::{segment, JellyfinHttpClient};

/// Library client bound to one session
///
/// Cheap to build; the dispatcher creates one per call from whatever
/// session the resolver produced.
pub struct JellyfinClient<'a> {
    http: &'a JellyfinHttpClient,
    session: &'a Session,
}

impl<'a> JellyfinClient<'a> {
    pub fn new(http: &'a Arc<JellyfinHttpClient>, session: &'a Session) -> Self {
        Self {
            http: http.as_ref(),
            session,
        }
    }

    fn token(&self) -> Option<&str> {
        Some(self.session.access_token.as_str())
    }

    fn user_id(&self) -> &str {
        &self.session.user_id
    }

    /// `GET /Users/{id}/Items`
    pub async fn list_items(&self, query: &Query) -> Result<Value, ApiError> {
        let path = format!("/Users/{}/Items", segment(self.user_id()));
        self.http.get_json(&path, self.token(), query).await
    }

    /// `GET /Search/Hints`
    pub async fn search_hints(&self, term: &str, limit: u32) -> Result<Value, ApiError> {
        let query = vec![
            ("SearchTerm".to_string(), term.to_string()),
            ("Limit".to_string(), limit.to_string()),
            ("UserId".to_string(), self.user_id().to_string()),
        ];
        self.http.get_json("/Search/Hints", self.token(), &query).await
    }

    /// `GET /Shows/NextUp`
    pub async fn next_up(&self, series_id: Option<&str>, limit: u32) -> Result<Value, ApiError> {
        let mut query = vec![
            ("UserId".to_string(), self.user_id().to_string()),
            ("Limit".to_string(), limit.to_string()),
        ];
        if let Some(series_id) = series_id.filter(|s| !s.is_empty()) {
            query.push(("SeriesId".to_string(), series_id.to_string()));
        }
        self.http.get_json("/Shows/NextUp", self.token(), &query).await
    }

    /// `GET /Users/{id}/Items/{itemId}`
    pub async fn item(&self, item_id: &str) -> Result<Value, ApiError> {
        let path = format!(
            "/Users/{}/Items/{}",
            segment(self.user_id()),
            segment(item_id)
        );
        self.http.get_json(&path, self.token(), &[]).await
    }

    /// `GET /Items/{itemId}/PlaybackInfo`
    pub async fn stream_info(&self, item_id: &str) -> Result<Value, ApiError> {
        let path = format!("/Items/{}/PlaybackInfo", segment(item_id));
        let query = vec![("UserId".to_string(), self.user_id().to_string())];
        self.http.get_json(&path, self.token(), &query).await
    }
}
