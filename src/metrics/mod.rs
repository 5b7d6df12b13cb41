// Tool call metrics

mod collector;

pub use collector::{LatencySummary, MetricsCollector, MetricsSnapshot, ToolStats, ToolSummary};
