// Similarity scoring for recommend_similar

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

/// Upper bound on ranked results
pub const MAX_RECOMMENDATIONS: usize = 50;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Person {
    pub name: String,
}

/// The subset of a Jellyfin item the scorer looks at
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RankableItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub production_year: Option<i32>,
    #[serde(default)]
    pub people: Vec<Person>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub item_id: String,
    pub score: u32,
    pub why: Vec<String>,
}

/// Score candidates against an optional seed item and mood text
///
/// Zero scores are dropped; ties keep candidate order.
pub fn simple_rank(
    candidates: &[RankableItem],
    seed: Option<&RankableItem>,
    mood: Option<&str>,
) -> Vec<Recommendation> {
    let mood_tokens = mood.map(tokenize).unwrap_or_default();

    let mut ranked: Vec<Recommendation> = candidates
        .iter()
        .map(|candidate| score(candidate, seed, &mood_tokens))
        .filter(|r| r.score > 0)
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(MAX_RECOMMENDATIONS);
    ranked
}

fn score(candidate: &RankableItem, seed: Option<&RankableItem>, mood_tokens: &[String]) -> Recommendation {
    let mut total = 0;
    let mut why = Vec::new();

    if let Some(seed) = seed {
        let genres = intersect(&seed.genres, &candidate.genres);
        if !genres.is_empty() {
            total += 2 * genres.len() as u32;
            why.push(format!("genres: {}", genres.join(", ")));
        }

        let seed_people: Vec<String> = seed.people.iter().map(|p| p.name.clone()).collect();
        let candidate_people: Vec<String> =
            candidate.people.iter().map(|p| p.name.clone()).collect();
        let people = intersect(&seed_people, &candidate_people);
        if !people.is_empty() {
            total += 3 * people.len() as u32;
            why.push(format!("people: {}", people.join(", ")));
        }

        if let (Some(a), Some(b)) = (seed.production_year, candidate.production_year) {
            let delta = (a - b).unsigned_abs().min(5);
            let bump = 5 - delta;
            if bump > 0 {
                total += bump;
                why.push("similar era".to_string());
            }
        }
    }

    if !mood_tokens.is_empty() {
        let text = format!(
            "{} {} {}",
            candidate.name,
            candidate.overview.as_deref().unwrap_or_default(),
            candidate.genres.join(" ")
        )
        .to_lowercase();
        let hits = mood_tokens.iter().filter(|t| text.contains(t.as_str())).count() as u32;
        if hits > 0 {
            total += hits;
            why.push(format!("mood matches ({})", hits));
        }
    }

    Recommendation {
        item_id: candidate.id.clone(),
        score: total,
        why,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    NON_WORD
        .split(&text.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Elements of `b` also in `a`, in `b`'s order
fn intersect(a: &[String], b: &[String]) -> Vec<String> {
    let set: HashSet<&String> = a.iter().collect();
    b.iter().filter(|x| set.contains(x)).cloned().collect()
}
