//! Recent message flows.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use rabbitwatch_types::MessageFlow;

/// Bounded, time-windowed list of the most recent flows, oldest first.
///
/// Flow ids are unique within the log. Producers may reuse ids, so a
/// colliding flow is stored under a freshly generated one.
#[derive(Debug, Clone)]
pub struct FlowLog {
    flows: VecDeque<MessageFlow>,
    ids: HashSet<String>,
    capacity: usize,
    ttl: Duration,
}

impl Default for FlowLog {
    fn default() -> Self {
        Self::new(50, Duration::from_secs(5))
    }
}

impl FlowLog {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            flows: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Append a flow, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, mut flow: MessageFlow) {
        if self.ids.contains(&flow.id) {
            let fresh = self.unique_id(flow.timestamp);
            debug!(original = %flow.id, %fresh, "flow id collision");
            flow.id = fresh;
        }

        self.ids.insert(flow.id.clone());
        self.flows.push_back(flow);

        while self.flows.len() > self.capacity {
            if let Some(evicted) = self.flows.pop_front() {
                self.ids.remove(&evicted.id);
            }
        }
    }

    /// Drop flows older than the retention window. Returns how many went.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(self.ttl.as_millis() as u64);
        let before = self.flows.len();
        let ids = &mut self.ids;
        self.flows.retain(|flow| {
            let keep = flow.timestamp >= cutoff;
            if !keep {
                ids.remove(&flow.id);
            }
            keep
        });
        before - self.flows.len()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn snapshot(&self) -> Vec<MessageFlow> {
        self.flows.iter().cloned().collect()
    }

    /// `{timestamp}-{9 random alphanumerics}-{sub-second nanos}`, retried
    /// until it is not already in the log.
    fn unique_id(&self, timestamp: u64) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let suffix: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(9)
                .map(char::from)
                .collect();
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or_default();
            let candidate = format!("{}-{}-{}", timestamp, suffix.to_lowercase(), nanos);
            if !self.ids.contains(&candidate) {
                return candidate;
            }
        }
    }
}
