use metrics::{Counter, Gauge};
use metrics_derive::Metrics;

#[derive(Metrics, Clone)]
#[metrics(scope = "bundle_scheduler.backrun_pool")]
pub(super) struct BackrunPoolMetrics {
    /// Current number of bundles in the backrun pool
    pub backrun_bundle_count: Gauge,
    /// Total bundles added to the pool
    pub backrun_bundles_added: Counter,
    /// Total bundles removed from the pool (landed or expired targets)
    pub backrun_bundles_removed: Counter,
    /// Total backruns proposed to the scheduler
    pub backrun_bundles_proposed: Counter,
}
