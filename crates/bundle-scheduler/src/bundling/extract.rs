use std::sync::Arc;
use tracing::{debug, warn};

use super::incorporate::incorporate;
use crate::{
    metrics::SchedulerMetrics,
    primitives::bundle::{Bundle, conflicts_with_any},
    traits::BundlingExtension,
    tx::{BuilderTx, TxOrGen},
};

/// Asks every extension for proposals, keeps the ones that do not conflict with
/// the bundles accepted earlier in this round, and incorporates them.
///
/// Extensions are called in registration order and see what was accepted before
/// them. At most `max_bundles` proposals are accepted. If incorporation fails the
/// round degrades to `pending` with no bundles.
pub fn extract_and_incorporate<T: BuilderTx>(
    pending: &[T],
    extensions: &[Arc<dyn BundlingExtension<T>>],
    max_bundles: usize,
    metrics: &SchedulerMetrics,
) -> (Vec<TxOrGen<T>>, Vec<Bundle<T>>) {
    if extensions.is_empty() {
        return (flat(pending), Vec::new());
    }

    let mut accepted: Vec<Bundle<T>> = Vec::new();
    for extension in extensions {
        let proposals = extension.extract_tx_bundles(pending, &accepted);
        let num_proposed = proposals.len();
        let mut num_accepted = 0;

        for proposal in proposals {
            if accepted.len() >= max_bundles || conflicts_with_any(&accepted, &proposal) {
                continue;
            }
            accepted.push(proposal);
            num_accepted += 1;
        }

        metrics.bundles_proposed.increment(num_proposed as u64);
        metrics.bundles_accepted.increment(num_accepted as u64);
        metrics
            .bundles_rejected
            .increment((num_proposed - num_accepted) as u64);
        debug!(
            target: "payload_builder",
            extension = extension.name(),
            proposed = num_proposed,
            accepted = num_accepted,
            "Extracted bundles"
        );
    }

    match incorporate(pending, &accepted) {
        Ok(txs) => (txs, accepted),
        Err(err) => {
            warn!(
                target: "payload_builder",
                %err,
                num_bundles = accepted.len(),
                "Dropping bundles, falling back to the pending transactions"
            );
            metrics.incorporation_fallbacks.increment(1);
            (flat(pending), Vec::new())
        }
    }
}

fn flat<T: BuilderTx>(pending: &[T]) -> Vec<TxOrGen<T>> {
    pending.iter().cloned().map(TxOrGen::Tx).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixedExtension, MockTx, ids, mock_bundle};
    use alloy_primitives::{Address, B256};

    fn pending(count: u64) -> Vec<MockTx> {
        (0..count)
            .map(|i| MockTx::new(Address::with_last_byte(i as u8 + 1), 0))
            .collect()
    }

    fn hashes(txs: &[MockTx]) -> Vec<B256> {
        txs.iter().map(MockTx::tx_hash).collect()
    }

    #[test]
    fn test_no_extensions_fast_path() {
        let pending = pending(3);

        let (txs, bundles) =
            extract_and_incorporate(&pending, &[], 10, &SchedulerMetrics::default());

        assert_eq!(ids(&txs), hashes(&pending));
        assert!(bundles.is_empty());
    }

    #[test]
    fn test_conflicting_proposals_are_dropped() {
        let pending = pending(4);
        let first = Arc::new(FixedExtension::new(
            "first",
            vec![mock_bundle(&pending[2..4], pending[0].tx_hash(), false)],
        ));
        let second = Arc::new(FixedExtension::new(
            "second",
            vec![
                // shares a member with the accepted bundle
                mock_bundle(&pending[3..4], B256::ZERO, false),
                // splits the accepted bundle
                mock_bundle(&pending[1..2], pending[2].tx_hash(), false),
                mock_bundle(&pending[1..2], pending[3].tx_hash(), false),
            ],
        ));
        let extensions: Vec<Arc<dyn BundlingExtension<MockTx>>> =
            vec![first.clone(), second.clone()];

        let (txs, bundles) =
            extract_and_incorporate(&pending, &extensions, 10, &SchedulerMetrics::default());

        assert_eq!(bundles.len(), 2);
        assert_eq!(
            ids(&txs),
            vec![
                pending[0].tx_hash(),
                pending[2].tx_hash(),
                pending[3].tx_hash(),
                pending[1].tx_hash()
            ]
        );
        // later extensions see what was accepted before them
        assert_eq!(*first.seen_accepted.lock().unwrap(), vec![0]);
        assert_eq!(*second.seen_accepted.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_bundle_cap() {
        let pending = pending(3);
        let extension = Arc::new(FixedExtension::new(
            "capped",
            vec![
                mock_bundle(&pending[1..2], B256::ZERO, false),
                mock_bundle(&pending[2..3], pending[0].tx_hash(), false),
            ],
        ));
        let extensions: Vec<Arc<dyn BundlingExtension<MockTx>>> = vec![extension];

        let (_, bundles) =
            extract_and_incorporate(&pending, &extensions, 1, &SchedulerMetrics::default());

        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].first_id(), Some(pending[1].tx_hash()));
    }

    #[test]
    fn test_falls_back_on_missing_target() {
        let pending = pending(2);
        let extension = Arc::new(FixedExtension::new(
            "stale",
            vec![mock_bundle(
                &pending[1..2],
                B256::with_last_byte(0x55),
                true,
            )],
        ));
        let extensions: Vec<Arc<dyn BundlingExtension<MockTx>>> = vec![extension];

        let (txs, bundles) =
            extract_and_incorporate(&pending, &extensions, 10, &SchedulerMetrics::default());

        assert_eq!(ids(&txs), hashes(&pending));
        assert!(bundles.is_empty());
    }
}
