// Library operations reachable through the dispatcher

use serde_json::{json, Value};

use super::client::JellyfinClient;
use super::params::{
    decode, GetStreamInfoInput, ListItemsInput, NextUpInput, RecommendSimilarInput,
    SearchItemsInput,
};
use super::ranker::{simple_rank, RankableItem};
use crate::error::ApiError;

/// Candidate pool size for recommend_similar
const CANDIDATE_POOL: u32 = 200;

pub const OPERATION_NAMES: [&str; 5] = [
    "list_items",
    "search_items",
    "next_up",
    "recommend_similar",
    "get_stream_info",
];

/// A decoded, validated library operation
#[derive(Debug, Clone)]
pub enum Operation {
    ListItems(ListItemsInput),
    SearchItems(SearchItemsInput),
    NextUp(NextUpInput),
    RecommendSimilar(RecommendSimilarInput),
    GetStreamInfo(GetStreamInfoInput),
}

impl Operation {
    pub fn is_library_operation(name: &str) -> bool {
        OPERATION_NAMES.contains(&name)
    }

    /// Decode and validate arguments for `name`
    pub fn parse(name: &str, args: &Value) -> Result<Self, ApiError> {
        let operation = match name {
            "list_items" => Operation::ListItems(decode(args)?),
            "search_items" => Operation::SearchItems(decode(args)?),
            "next_up" => Operation::NextUp(decode(args)?),
            "recommend_similar" => Operation::RecommendSimilar(decode(args)?),
            "get_stream_info" => Operation::GetStreamInfo(decode(args)?),
            other => return Err(ApiError::UnknownOperation(other.to_string())),
        };
        operation.validate()?;
        Ok(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListItems(_) => "list_items",
            Operation::SearchItems(_) => "search_items",
            Operation::NextUp(_) => "next_up",
            Operation::RecommendSimilar(_) => "recommend_similar",
            Operation::GetStreamInfo(_) => "get_stream_info",
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        match self {
            Operation::ListItems(input) => input.validate(),
            Operation::SearchItems(input) => input.validate(),
            Operation::NextUp(input) => input.validate(),
            Operation::RecommendSimilar(input) => input.validate(),
            Operation::GetStreamInfo(input) => input.validate(),
        }
    }

    pub async fn execute(&self, client: &JellyfinClient<'_>) -> Result<Value, ApiError> {
        match self {
            Operation::ListItems(input) => list_items(client, input).await,
            Operation::SearchItems(input) => search_items(client, input).await,
            Operation::NextUp(input) => next_up(client, input).await,
            Operation::RecommendSimilar(input) => recommend_similar(client, input).await,
            Operation::GetStreamInfo(input) => get_stream_info(client, input).await,
        }
    }
}

async fn list_items(client: &JellyfinClient<'_>, input: &ListItemsInput) -> Result<Value, ApiError> {
    let response = client.list_items(&input.to_query()).await?;
    let items = items_of(&response);

    let mut result = json!({
        "items": items,
        "total": total_of(&response),
    });
    // No cursor past the last addressable index
    if items.len() as u32 == input.limit {
        if let Some(next) = input.start_index().checked_add(input.limit) {
            result["next_cursor"] = json!(next.to_string());
        }
    }
    Ok(result)
}

async fn search_items(
    client: &JellyfinClient<'_>,
    input: &SearchItemsInput,
) -> Result<Value, ApiError> {
    let items = match input.search_term() {
        Some(term) => {
            let response = client.search_hints(term, input.limit).await?;
            array_field(&response, "SearchHints")
        }
        None => {
            let response = client.list_items(&input.to_listing_query()).await?;
            items_of(&response)
        }
    };

    let limit = input.limit as usize;
    let mut result = json!({
        "items": items.iter().take(limit).cloned().collect::<Vec<_>>(),
        "total": items.len(),
    });
    if items.len() > limit {
        result["next_cursor"] = json!("next_page");
    }
    Ok(result)
}

async fn next_up(client: &JellyfinClient<'_>, input: &NextUpInput) -> Result<Value, ApiError> {
    let response = client
        .next_up(input.series_id.as_deref(), input.limit)
        .await?;
    Ok(json!({
        "items": items_of(&response),
        "total": total_of(&response),
    }))
}

async fn recommend_similar(
    client: &JellyfinClient<'_>,
    input: &RecommendSimilarInput,
) -> Result<Value, ApiError> {
    let seed = match input.seed_item_id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) => {
            let raw = client.item(id).await?;
            Some(rankable(&raw))
        }
        None => None,
    };

    let query = vec![
        ("Recursive".to_string(), "true".to_string()),
        ("Limit".to_string(), CANDIDATE_POOL.to_string()),
        ("IncludeItemTypes".to_string(), "Movie,Series".to_string()),
        (
            "Fields".to_string(),
            "Genres,People,Overview,ProductionYear".to_string(),
        ),
    ];
    let response = client.list_items(&query).await?;
    let raw_candidates = items_of(&response);
    let candidates: Vec<RankableItem> = raw_candidates.iter().map(rankable).collect();

    let ranked = simple_rank(
        &candidates,
        seed.as_ref(),
        input.mood.as_deref().filter(|m| !m.is_empty()),
    );

    let items: Vec<Value> = ranked
        .into_iter()
        .take(input.limit as usize)
        .map(|rec| {
            let mut item = raw_candidates
                .iter()
                .find(|raw| raw.get("Id").and_then(Value::as_str) == Some(rec.item_id.as_str()))
                .cloned()
                .unwrap_or_else(|| json!({"Id": rec.item_id}));
            if let Some(obj) = item.as_object_mut() {
                obj.insert("score".to_string(), json!(rec.score));
                obj.insert("why".to_string(), json!(rec.why));
            }
            item
        })
        .collect();

    Ok(json!({ "items": items }))
}

async fn get_stream_info(
    client: &JellyfinClient<'_>,
    input: &GetStreamInfoInput,
) -> Result<Value, ApiError> {
    let response = client.stream_info(&input.item_id).await?;
    let source = response
        .get("MediaSources")
        .and_then(Value::as_array)
        .and_then(|sources| sources.first());

    let can_direct_play = source
        .and_then(|s| s.get("SupportsDirectStream"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let container = source
        .and_then(|s| s.get("Container"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or("unknown");

    Ok(json!({
        "can_direct_play": can_direct_play,
        "container": container,
    }))
}

fn rankable(raw: &Value) -> RankableItem {
    serde_json::from_value(raw.clone()).unwrap_or_default()
}

fn array_field(response: &Value, key: &str) -> Vec<Value> {
    response
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn items_of(response: &Value) -> Vec<Value> {
    array_field(response, "Items")
}

fn total_of(response: &Value) -> u64 {
    response
        .get("TotalRecordCount")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}
