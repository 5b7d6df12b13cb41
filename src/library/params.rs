// Tool inputs and their mapping onto Jellyfin query parameters

use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// Jellyfin query parameters, in insertion order
pub type Query = Vec<(String, String)>;

pub const LIST_LIMIT_MAX: u32 = 200;
pub const SEARCH_LIMIT_MAX: u32 = 100;
pub const NEXT_UP_LIMIT_MAX: u32 = 50;
pub const RECOMMEND_LIMIT_MAX: u32 = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum View {
    #[default]
    All,
    Movies,
    Shows,
    Episodes,
    Music,
}

impl View {
    /// `IncludeItemTypes` value, `None` for `All`
    pub fn item_types(&self) -> Option<&'static str> {
        match self {
            View::All => None,
            View::Movies => Some("Movie"),
            View::Shows => Some("Series"),
            View::Episodes => Some("Episode"),
            View::Music => Some("Audio,MusicVideo"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SortBy {
    Random,
    CommunityRating,
    PremiereDate,
    PlayCount,
    #[default]
    DateCreated,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Random => "Random",
            SortBy::CommunityRating => "CommunityRating",
            SortBy::PremiereDate => "PremiereDate",
            SortBy::PlayCount => "PlayCount",
            SortBy::DateCreated => "DateCreated",
        }
    }
}

/// Structured filters shared by `list_items` and `search_items`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Filters {
    pub include_item_types: Option<Vec<String>>,
    pub genres: Option<Vec<String>>,
    pub people: Option<Vec<String>>,
    pub studios: Option<Vec<String>>,
    pub year_range: Option<(i32, i32)>,
    pub runtime_minutes: Option<(u32, u32)>,
    pub kid_safe: Option<bool>,
    pub text: Option<String>,
}

impl Filters {
    pub fn apply(&self, query: &mut Query) {
        if let Some(types) = &self.include_item_types {
            set(query, "IncludeItemTypes", types.join(","));
        }
        if let Some(genres) = &self.genres {
            set(query, "Genres", genres.join(","));
        }
        if let Some(people) = &self.people {
            set(query, "Person", people.join(","));
        }
        if let Some(studios) = &self.studios {
            set(query, "Studios", studios.join(","));
        }
        if let Some((min, max)) = self.year_range {
            set(query, "Years", format!("{},{}", min, max));
        }
        if let Some((min, max)) = self.runtime_minutes {
            set(query, "MinRuntime", min.to_string());
            set(query, "MaxRuntime", max.to_string());
        }
        if self.kid_safe == Some(true) {
            set(query, "MaxOfficialRating", "PG".to_string());
        }
        if let Some(text) = &self.text {
            set(query, "SearchTerm", text.clone());
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListItemsInput {
    #[serde(default)]
    pub view: View,
    pub filters: Option<Filters>,
    #[serde(default)]
    pub sort: SortBy,
    pub limit: u32,
    pub cursor: Option<String>,
}

impl ListItemsInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_limit(self.limit, LIST_LIMIT_MAX)
    }

    /// Offset encoded in the cursor; unparseable cursors restart at 0
    pub fn start_index(&self) -> u32 {
        self.cursor
            .as_deref()
            .and_then(|c| c.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn to_query(&self) -> Query {
        let mut query = vec![
            ("Recursive".to_string(), "true".to_string()),
            ("Limit".to_string(), self.limit.min(LIST_LIMIT_MAX).to_string()),
            ("SortBy".to_string(), self.sort.as_str().to_string()),
            ("SortOrder".to_string(), "Descending".to_string()),
        ];
        if let Some(types) = self.view.item_types() {
            set(&mut query, "IncludeItemTypes", types.to_string());
        }
        if let Some(filters) = &self.filters {
            filters.apply(&mut query);
        }
        if self.cursor.is_some() {
            set(&mut query, "StartIndex", self.start_index().to_string());
        }
        query
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchItemsInput {
    pub query: Option<String>,
    pub filters: Option<Filters>,
    #[serde(default = "default_search_limit")]
    pub limit: u32,
    pub cursor: Option<String>,
}

impl SearchItemsInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_limit(self.limit, SEARCH_LIMIT_MAX)
    }

    /// Non-empty search text, if any
    pub fn search_term(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }

    /// Listing used when no search text was given
    pub fn to_listing_query(&self) -> Query {
        let mut query = vec![
            ("Recursive".to_string(), "true".to_string()),
            ("Limit".to_string(), self.limit.min(SEARCH_LIMIT_MAX).to_string()),
        ];
        if let Some(filters) = &self.filters {
            filters.apply(&mut query);
        }
        query
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NextUpInput {
    pub series_id: Option<String>,
    #[serde(default = "default_small_limit")]
    pub limit: u32,
}

impl NextUpInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_limit(self.limit, NEXT_UP_LIMIT_MAX)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendSimilarInput {
    pub seed_item_id: Option<String>,
    pub mood: Option<String>,
    #[serde(default = "default_small_limit")]
    pub limit: u32,
}

impl RecommendSimilarInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        check_limit(self.limit, RECOMMEND_LIMIT_MAX)?;
        let has_seed = self.seed_item_id.as_deref().is_some_and(|s| !s.is_empty());
        let has_mood = self.mood.as_deref().is_some_and(|m| !m.is_empty());
        if !has_seed && !has_mood {
            return Err(ApiError::ValidationError(
                "Provide seed_item_id or mood".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetStreamInfoInput {
    pub item_id: String,
}

impl GetStreamInfoInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.item_id.trim().is_empty() {
            return Err(ApiError::ValidationError("item_id is required".to_string()));
        }
        Ok(())
    }
}

/// Decode tool arguments; `null` is treated as an empty object
pub fn decode<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ApiError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args.clone()
    };
    serde_json::from_value(args).map_err(|e| ApiError::ValidationError(e.to_string()))
}

fn default_search_limit() -> u32 {
    24
}

fn default_small_limit() -> u32 {
    10
}

fn check_limit(limit: u32, max: u32) -> Result<(), ApiError> {
    if limit == 0 || limit > max {
        return Err(ApiError::ValidationError(format!(
            "limit must be between 1 and {}",
            max
        )));
    }
    Ok(())
}

/// Insert or overwrite a parameter
fn set(query: &mut Query, key: &str, value: String) {
    match query.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => query.push((key.to_string(), value)),
    }
}
