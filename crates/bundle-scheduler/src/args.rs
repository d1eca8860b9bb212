//! clap [Args](clap::Args) for the scheduler.
//!
//! | Flag | Default | Description |
//! |------|---------|-------------|
//! | `--builder.time-budget-ms` | `250` | Wall clock budget of the execution loop |
//! | `--bundles.enabled` | `true` | Ask bundling extensions for proposals |
//! | `--bundles.max-per-block` | `100` | Accepted bundles per block |
use clap::Args;
use core::time::Duration;

const DEFAULT_TIME_BUDGET_MS: u64 = 250;
const DEFAULT_BUNDLES_ENABLED: bool = true;
const DEFAULT_MAX_BUNDLES_PER_BLOCK: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Args)]
#[command(next_help_heading = "Scheduler")]
pub struct SchedulerArgs {
    /// Time budget of one block building pass in milliseconds
    #[arg(
        long = "builder.time-budget-ms",
        default_value_t = DEFAULT_TIME_BUDGET_MS,
        env = "BUILDER_TIME_BUDGET_MS"
    )]
    pub time_budget_ms: u64,

    /// Whether bundling extensions are consulted
    #[arg(
        long = "bundles.enabled",
        default_value_t = DEFAULT_BUNDLES_ENABLED,
        action = clap::ArgAction::Set
    )]
    pub bundles_enabled: bool,

    /// Proposals past this many accepted bundles are rejected
    #[arg(long = "bundles.max-per-block", default_value_t = DEFAULT_MAX_BUNDLES_PER_BLOCK)]
    pub max_bundles_per_block: usize,
}

impl SchedulerArgs {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

impl Default for SchedulerArgs {
    fn default() -> Self {
        Self {
            time_budget_ms: DEFAULT_TIME_BUDGET_MS,
            bundles_enabled: DEFAULT_BUNDLES_ENABLED,
            max_bundles_per_block: DEFAULT_MAX_BUNDLES_PER_BLOCK,
        }
    }
}
