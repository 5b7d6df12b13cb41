// Tool and resource catalog

use serde::Serialize;
use serde_json::{json, Value};

use crate::library::SNAPSHOT_URI;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

fn filters_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "include_item_types": { "type": "array", "items": { "type": "string" } },
            "genres": { "type": "array", "items": { "type": "string" } },
            "people": { "type": "array", "items": { "type": "string" } },
            "studios": { "type": "array", "items": { "type": "string" } },
            "year_range": { "type": "array", "items": { "type": "integer" }, "minItems": 2, "maxItems": 2 },
            "runtime_minutes": { "type": "array", "items": { "type": "integer" }, "minItems": 2, "maxItems": 2 },
            "kid_safe": { "type": "boolean" },
            "text": { "type": "string" }
        }
    })
}

/// Every tool the dispatcher accepts
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "list_items",
            description: "Filtered listing from the user's library",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "view": {
                        "type": "string",
                        "enum": ["All", "Movies", "Shows", "Episodes", "Music"],
                        "default": "All"
                    },
                    "filters": filters_schema(),
                    "sort": {
                        "type": "string",
                        "enum": ["Random", "CommunityRating", "PremiereDate", "PlayCount", "DateCreated"],
                        "default": "DateCreated"
                    },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200 },
                    "cursor": { "type": "string" }
                },
                "required": ["limit"]
            }),
        },
        ToolDescriptor {
            name: "search_items",
            description: "Search by text and/or structured filters",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "filters": filters_schema(),
                    "limit": { "type": "integer", "minimum": 1, "maximum": 100, "default": 24 },
                    "cursor": { "type": "string" }
                }
            }),
        },
        ToolDescriptor {
            name: "next_up",
            description: "Personalized continuation for TV",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "series_id": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 50, "default": 10 }
                }
            }),
        },
        ToolDescriptor {
            name: "recommend_similar",
            description: "Similar items with rationale strings",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "seed_item_id": { "type": "string" },
                    "mood": { "type": "string" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 50, "default": 10 }
                }
            }),
        },
        ToolDescriptor {
            name: "get_stream_info",
            description: "Playback capability data",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "item_id": { "type": "string" }
                },
                "required": ["item_id"]
            }),
        },
        ToolDescriptor {
            name: "authenticate_user",
            description: "Exchange username/password for a user-scoped access token and set it for this session.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "username": { "type": "string" },
                    "password": { "type": "string" }
                },
                "required": ["username", "password"]
            }),
        },
        ToolDescriptor {
            name: "set_token",
            description: "Set the active Jellyfin access token (and optional userId) for this session.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "access_token": { "type": "string" },
                    "user_id": { "type": "string" }
                },
                "required": ["access_token"]
            }),
        },
    ]
}

pub fn resources() -> Vec<ResourceDescriptor> {
    vec![ResourceDescriptor {
        uri: SNAPSHOT_URI,
        name: "Library snapshot",
        description: "Small, fast overview for conversational cold starts",
        mime_type: "application/json",
    }]
}
