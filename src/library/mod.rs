// Jellyfin library access
// Tool inputs, the per-session read client, ranking and the snapshot resource

mod client;
mod operations;
mod params;
mod ranker;
mod snapshot;

pub use client::JellyfinClient;
pub use operations::{Operation, OPERATION_NAMES};
pub use params::{
    Filters, GetStreamInfoInput, ListItemsInput, NextUpInput, RecommendSimilarInput,
    SearchItemsInput, SortBy, View,
};
pub use ranker::{simple_rank, Person, RankableItem, Recommendation, MAX_RECOMMENDATIONS};
pub use snapshot::{aggregate as aggregate_snapshot, fetch as fetch_snapshot, LibrarySnapshot, TypeCounts, SNAPSHOT_URI};
