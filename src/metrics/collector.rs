use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Ring buffer capacity for latency samples
const RING_BUFFER_CAPACITY: usize = 3600;

/// Maximum age for samples (15 minutes)
const MAX_SAMPLE_AGE: Duration = Duration::from_secs(15 * 60);

/// Per-tool statistics
#[derive(Debug, Default)]
pub struct ToolStats {
    pub call_count: AtomicU64,
    pub error_count: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl ToolStats {
    pub fn record(&self, latency_ms: f64, failed: bool) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms
            .fetch_add(latency_ms as u64, Ordering::Relaxed);
    }

    /// Get average latency in milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.call_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        total as f64 / count as f64
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSummary {
    pub calls: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LatencySummary {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Point-in-time view served by `GET /metrics`
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub active_calls: u64,
    pub total_calls: u64,
    pub total_errors: u64,
    pub errors_by_type: BTreeMap<String, u64>,
    pub latency_ms: LatencySummary,
    pub tools: BTreeMap<String, ToolSummary>,
}

/// Tool call metrics
pub struct MetricsCollector {
    /// Calls currently in flight
    active_calls: AtomicU64,

    /// Lifetime total call count
    total_calls: AtomicU64,

    /// Lifetime total error count
    total_errors: AtomicU64,

    /// Errors keyed by error type
    errors_by_type: DashMap<String, AtomicU64>,

    /// Latency samples (time, latency_ms) - ring buffer
    latency_samples: Mutex<VecDeque<(Instant, f64)>>,

    /// Per-tool statistics
    per_tool_stats: DashMap<String, ToolStats>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            active_calls: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            errors_by_type: DashMap::new(),
            latency_samples: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)),
            per_tool_stats: DashMap::new(),
        }
    }

    /// Record the start of a tool call
    pub fn record_call_start(&self) {
        self.active_calls.fetch_add(1, Ordering::Relaxed);
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a tool call; `error_type` is set for failures
    pub fn record_call_end(&self, tool: &str, latency_ms: f64, error_type: Option<&str>) {
        self.active_calls.fetch_sub(1, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            if samples.len() >= RING_BUFFER_CAPACITY {
                samples.pop_front();
            }
            samples.push_back((Instant::now(), latency_ms));
        }

        self.per_tool_stats
            .entry(tool.to_string())
            .or_default()
            .record(latency_ms, error_type.is_some());

        if let Some(error_type) = error_type {
            self.record_error(error_type);
        }
    }

    /// A call that ended without a result (client went away)
    pub fn record_call_abandoned(&self) {
        self.active_calls.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);

        self.errors_by_type
            .entry(error_type.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_active_calls(&self) -> u64 {
        self.active_calls.load(Ordering::Relaxed)
    }

    /// Get latency percentiles (p50, p95, p99)
    pub fn get_latency_percentiles(&self) -> (f64, f64, f64) {
        let samples = match self.latency_samples.lock() {
            Ok(s) => s,
            Err(_) => return (0.0, 0.0, 0.0),
        };

        if samples.is_empty() {
            return (0.0, 0.0, 0.0);
        }

        let mut latencies: Vec<f64> = samples.iter().map(|(_, lat)| *lat).collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let len = latencies.len();
        let pick = |q: f64| {
            let idx = ((len as f64 * q) as usize).min(len - 1);
            latencies.get(idx).copied().unwrap_or(0.0)
        };

        (pick(0.50), pick(0.95), pick(0.99))
    }

    /// Drop latency samples older than 15 minutes
    pub fn cleanup_old_samples(&self) {
        let cutoff = Instant::now() - MAX_SAMPLE_AGE;
        if let Ok(mut samples) = self.latency_samples.lock() {
            samples.retain(|(time, _)| *time >= cutoff);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (p50, p95, p99) = self.get_latency_percentiles();

        let errors_by_type = self
            .errors_by_type
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        let tools = self
            .per_tool_stats
            .iter()
            .map(|entry| {
                let stats = entry.value();
                (
                    entry.key().clone(),
                    ToolSummary {
                        calls: stats.call_count.load(Ordering::Relaxed),
                        errors: stats.error_count.load(Ordering::Relaxed),
                        avg_latency_ms: stats.avg_latency_ms(),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            active_calls: self.get_active_calls(),
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            errors_by_type,
            latency_ms: LatencySummary { p50, p95, p99 },
            tools,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
