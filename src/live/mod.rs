//! Presentation state: bounded caches over the coordinator's streams.

mod flows;
mod metrics;
mod view;

pub use flows::FlowLog;
pub use metrics::MetricsCache;
pub use view::{LiveSnapshot, LiveView, LiveViewConfig};
