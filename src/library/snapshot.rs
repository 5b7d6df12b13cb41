// Library snapshot resource: recent additions and top genres

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use super::client::JellyfinClient;
use crate::error::ApiError;

pub const SNAPSHOT_URI: &str = "jellyfin://snapshot";
const RECENT_LIMIT: u32 = 30;
const TOP_GENRES: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TypeCounts {
    pub movies: u32,
    pub series: u32,
    pub episodes: u32,
    pub music: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibrarySnapshot {
    pub summary: String,
    pub counts: TypeCounts,
    pub top_genres: Vec<(String, u32)>,
}

pub async fn fetch(client: &JellyfinClient<'_>) -> Result<LibrarySnapshot, ApiError> {
    let query = vec![
        ("SortBy".to_string(), "DateCreated".to_string()),
        ("SortOrder".to_string(), "Descending".to_string()),
        ("Limit".to_string(), RECENT_LIMIT.to_string()),
        ("Recursive".to_string(), "true".to_string()),
    ];
    let response = client.list_items(&query).await?;
    let items = response
        .get("Items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    Ok(aggregate(items))
}

/// Count item types and genres over a page of raw Jellyfin items
pub fn aggregate(items: &[Value]) -> LibrarySnapshot {
    let mut counts = TypeCounts::default();
    let mut genres: Vec<(String, u32)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        match item.get("Type").and_then(Value::as_str) {
            Some("Movie") => counts.movies += 1,
            Some("Series") => counts.series += 1,
            Some("Episode") => counts.episodes += 1,
            Some("Audio") | Some("MusicVideo") => counts.music += 1,
            _ => {}
        }

        let item_genres = item
            .get("Genres")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for genre in item_genres {
            // first-seen order breaks ties
            match index.get(genre) {
                Some(&i) => genres[i].1 += 1,
                None => {
                    index.insert(genre.to_string(), genres.len());
                    genres.push((genre.to_string(), 1));
                }
            }
        }
    }

    genres.sort_by(|a, b| b.1.cmp(&a.1));
    genres.truncate(TOP_GENRES);

    LibrarySnapshot {
        summary: format!("Recent additions: {}", items.len()),
        counts,
        top_genres: genres,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregate_counts_and_genres() {
        let items = vec![
            json!({"Type": "Movie", "Genres": ["Drama", "Noir"]}),
            json!({"Type": "Series", "Genres": ["Drama"]}),
            json!({"Type": "Episode"}),
            json!({"Type": "Audio", "Genres": ["Jazz"]}),
            json!({"Type": "MusicVideo"}),
            json!({"Type": "BoxSet", "Genres": ["Drama"]}),
        ];

        let snapshot = aggregate(&items);
        assert_eq!(snapshot.summary, "Recent additions: 6");
        assert_eq!(
            snapshot.counts,
            TypeCounts {
                movies: 1,
                series: 1,
                episodes: 1,
                music: 2,
            }
        );
        assert_eq!(
            snapshot.top_genres,
            vec![
                ("Drama".to_string(), 3),
                ("Noir".to_string(), 1),
                ("Jazz".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_top_genres_capped() {
        let items: Vec<Value> = (0..15)
            .map(|i| json!({"Type": "Movie", "Genres": [format!("G{}", i)]}))
            .collect();
        assert_eq!(aggregate(&items).top_genres.len(), 10);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(aggregate(&[json!({"Type": "Movie", "Genres": ["Drama"]})])).unwrap();
        assert_eq!(value["top_genres"], json!([["Drama", 1]]));
        assert_eq!(value["counts"]["movies"], 1);
    }

    #[test]
    fn test_empty_page() {
        let snapshot = aggregate(&[]);
        assert_eq!(snapshot.summary, "Recent additions: 0");
        assert!(snapshot.top_genres.is_empty());
    }
}
