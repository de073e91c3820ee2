//! Latest metric per node.

use std::collections::HashMap;
use std::time::Duration;

use rabbitwatch_types::Metric;

/// Keeps the most recently received [`Metric`] for each node.
///
/// Entries whose producer timestamp falls outside the retention window are
/// removed by [`prune`](Self::prune).
#[derive(Debug, Clone)]
pub struct MetricsCache {
    entries: HashMap<String, Metric>,
    ttl: Duration,
}

impl Default for MetricsCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl MetricsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Store a metric, replacing whatever was held for its node.
    pub fn apply(&mut self, metric: Metric) {
        self.entries.insert(metric.node_id.clone(), metric);
    }

    /// Drop entries older than the retention window. Returns how many went.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(self.ttl.as_millis() as u64);
        let before = self.entries.len();
        self.entries.retain(|_, metric| metric.timestamp >= cutoff);
        before - self.entries.len()
    }

    pub fn get(&self, node_id: &str) -> Option<&Metric> {
        self.entries.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by node id for stable display.
    pub fn snapshot(&self) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = self.entries.values().cloned().collect();
        metrics.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        metrics
    }
}
