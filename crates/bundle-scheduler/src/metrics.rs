use metrics::{Counter, Histogram};
use metrics_derive::Metrics;

/// Scheduler metrics, recorded once per pass unless noted otherwise.
#[derive(Metrics, Clone)]
#[metrics(scope = "bundle_scheduler")]
pub struct SchedulerMetrics {
    /// Bundles proposed by the bundling extensions
    pub bundles_proposed: Counter,
    /// Bundles accepted into the round
    pub bundles_accepted: Counter,
    /// Bundles rejected because of a conflict or the per block cap
    pub bundles_rejected: Counter,
    /// Rounds that fell back to the flat transaction list
    pub incorporation_fallbacks: Counter,
    /// Number of entries in the incorporated schedule
    pub schedule_length: Histogram,
    /// Transactions committed
    pub txs_committed: Counter,
    /// Bundles committed as a whole
    pub bundles_committed: Counter,
    /// Bundles reverted or discarded before execution
    pub bundles_reverted: Counter,
    /// Entries removed through a shift
    pub entries_shifted: Counter,
    /// Entries removed through a cascading pop
    pub entries_popped: Counter,
    /// Passes stopped by the time budget
    pub time_budget_aborts: Counter,
    /// Duration of the execution loop
    pub pass_duration: Histogram,
}
