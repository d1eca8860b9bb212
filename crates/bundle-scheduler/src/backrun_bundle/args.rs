//! Limits on what the backrun extension proposes to the scheduler.
//!
//! Nothing is proposed unless `--backruns.enabled` is set. Pooled backruns are
//! looked up per pending target in schedule order, best priority fee first, and
//! each lookup counts as considered while each emitted bundle counts as proposed:
//!
//! - `--backruns.max_considered_backruns_per_block` (100) and
//!   `--backruns.max_landed_backruns_per_block` (100) stop the walk over targets.
//! - `--backruns.max_considered_backruns_per_transaction` (10) and
//!   `--backruns.max_landed_backruns_per_transaction` (1) move on to the next target.
//!
//! A proposal claims its target exclusively, so raising the per transaction
//! proposal limit only offers fallbacks to the conflict filter.

use clap::Args;

const BACKRUNS_ENABLED: bool = false;
const BLOCK_CONSIDERED: usize = 100;
const BLOCK_PROPOSED: usize = 100;
const TARGET_CONSIDERED: usize = 10;
const TARGET_PROPOSED: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct BackrunBundleArgs {
    /// Propose pooled backruns as target-required bundles
    #[arg(long = "backruns.enabled", default_value_t = BACKRUNS_ENABLED)]
    pub backruns_enabled: bool,

    /// Pool entries looked at per block
    #[arg(long = "backruns.max_considered_backruns_per_block", default_value_t = BLOCK_CONSIDERED)]
    pub max_considered_backruns_per_block: usize,

    /// Bundles proposed per block
    #[arg(long = "backruns.max_landed_backruns_per_block", default_value_t = BLOCK_PROPOSED)]
    pub max_landed_backruns_per_block: usize,

    /// Pool entries looked at per target
    #[arg(
        long = "backruns.max_considered_backruns_per_transaction",
        default_value_t = TARGET_CONSIDERED
    )]
    pub max_considered_backruns_per_transaction: usize,

    /// Bundles proposed per target
    #[arg(
        long = "backruns.max_landed_backruns_per_transaction",
        default_value_t = TARGET_PROPOSED
    )]
    pub max_landed_backruns_per_transaction: usize,
}

impl BackrunBundleArgs {
    /// Whether the walk over pending targets has to stop.
    pub fn is_block_limit_reached(&self, considered: usize, proposed: usize) -> bool {
        considered >= self.max_considered_backruns_per_block
            || proposed >= self.max_landed_backruns_per_block
    }

    /// Whether the current target is done with.
    pub fn is_tx_limit_reached(&self, considered: usize, proposed: usize) -> bool {
        considered >= self.max_considered_backruns_per_transaction
            || proposed >= self.max_landed_backruns_per_transaction
    }
}

impl Default for BackrunBundleArgs {
    fn default() -> Self {
        Self {
            backruns_enabled: BACKRUNS_ENABLED,
            max_considered_backruns_per_block: BLOCK_CONSIDERED,
            max_landed_backruns_per_block: BLOCK_PROPOSED,
            max_considered_backruns_per_transaction: TARGET_CONSIDERED,
            max_landed_backruns_per_transaction: TARGET_PROPOSED,
        }
    }
}
