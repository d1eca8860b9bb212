//! Backrun bundles: a transaction that must land right after a given pending
//! transaction, or not at all.
pub mod args;
mod metrics;
pub mod pool;

use alloy_primitives::B256;
use std::collections::HashSet;
use tracing::trace;

use crate::{
    primitives::bundle::Bundle,
    traits::BundlingExtension,
    tx::{BuilderTx, TxOrGen},
};
use args::BackrunBundleArgs;
use pool::BackrunBundlePool;

/// Proposes the pooled backruns of the pending transactions as single
/// transaction bundles that require their target.
#[derive(Debug, Clone)]
pub struct BackrunBundleExtension<T> {
    pub pool: BackrunBundlePool<T>,
    pub args: BackrunBundleArgs,
}

impl<T: BuilderTx> BackrunBundleExtension<T> {
    pub fn new(pool: BackrunBundlePool<T>, args: BackrunBundleArgs) -> Self {
        Self { pool, args }
    }
}

impl<T: BuilderTx> BundlingExtension<T> for BackrunBundleExtension<T> {
    fn name(&self) -> &'static str {
        "backrun"
    }

    fn extract_tx_bundles(&self, pending: &[T], accepted: &[Bundle<T>]) -> Vec<Bundle<T>> {
        if !self.args.backruns_enabled || self.pool.is_empty() {
            return Vec::new();
        }

        // anchors already claimed exclusively and entries already placed
        let claimed_targets: HashSet<B256> = accepted
            .iter()
            .filter(|bundle| bundle.target_required)
            .map(|bundle| bundle.target_tx_hash)
            .collect();
        let mut claimed_ids: HashSet<B256> = accepted
            .iter()
            .flat_map(|bundle| bundle.txs().iter().map(TxOrGen::id))
            .collect();

        let mut proposals = Vec::new();
        let mut block_considered = 0;
        let mut block_landed = 0;

        for tx in pending {
            if self
                .args
                .is_block_limit_reached(block_considered, block_landed)
            {
                break;
            }

            let target = tx.tx_hash();
            if claimed_targets.contains(&target) {
                continue;
            }
            let Some(backruns) = self.pool.get_backruns(&target) else {
                continue;
            };

            let mut tx_considered = 0;
            let mut tx_landed = 0;
            for backrun in backruns.iter() {
                if self.args.is_tx_limit_reached(tx_considered, tx_landed)
                    || self
                        .args
                        .is_block_limit_reached(block_considered, block_landed)
                {
                    break;
                }
                tx_considered += 1;
                block_considered += 1;

                let backrun_hash = backrun.backrun_tx_hash();
                if !claimed_ids.insert(backrun_hash) {
                    trace!(
                        target: "payload_builder",
                        target_tx = ?target,
                        backrun_tx = ?backrun_hash,
                        "Backrun already placed, skipping"
                    );
                    continue;
                }

                proposals.push(Bundle::new(
                    vec![TxOrGen::Tx(backrun.0.backrun_tx.clone())],
                    target,
                    true,
                ));
                tx_landed += 1;
                block_landed += 1;
            }
        }

        self.pool
            .metrics()
            .backrun_bundles_proposed
            .increment(proposals.len() as u64);
        proposals
    }
}
