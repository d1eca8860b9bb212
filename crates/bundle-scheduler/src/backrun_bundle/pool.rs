use alloy_primitives::B256;
use dashmap::DashMap;
use std::{cmp::Ordering, collections::BTreeSet, fmt, sync::Arc};

use super::metrics::BackrunPoolMetrics;
use crate::tx::BuilderTx;

#[derive(Debug, Clone)]
pub struct BackrunBundle<T> {
    /// Hash of the target tx; we assume it's in the pending set.
    pub target_tx_hash: B256,
    pub backrun_tx: T,
    /// Priority fee the backrun pays, used to rank competing backruns.
    pub priority_fee: u128,
}

/// Ord impl: highest `priority_fee` first, backrun tx hash as tiebreaker.
#[derive(Debug, Clone)]
pub struct OrderedBackrunBundle<T>(pub BackrunBundle<T>);

impl<T: BuilderTx> OrderedBackrunBundle<T> {
    pub fn backrun_tx_hash(&self) -> B256 {
        self.0.backrun_tx.tx_hash()
    }
}

impl<T: BuilderTx> PartialEq for OrderedBackrunBundle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.backrun_tx_hash() == other.backrun_tx_hash()
    }
}

impl<T: BuilderTx> Eq for OrderedBackrunBundle<T> {}

impl<T: BuilderTx> PartialOrd for OrderedBackrunBundle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: BuilderTx> Ord for OrderedBackrunBundle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .priority_fee
            .cmp(&self.0.priority_fee)
            .then_with(|| self.backrun_tx_hash().cmp(&other.backrun_tx_hash()))
    }
}

#[derive(Debug, Clone)]
pub struct TxBackruns<T> {
    pub bundles: BTreeSet<OrderedBackrunBundle<T>>,
}

impl<T> Default for TxBackruns<T> {
    fn default() -> Self {
        Self {
            bundles: BTreeSet::new(),
        }
    }
}

impl<T> TxBackruns<T> {
    pub fn iter(&self) -> impl Iterator<Item = &OrderedBackrunBundle<T>> {
        self.bundles.iter()
    }
}

struct BackrunBundlePoolInner<T> {
    by_target: DashMap<B256, TxBackruns<T>>,
    metrics: BackrunPoolMetrics,
}

impl<T: fmt::Debug> fmt::Debug for BackrunBundlePoolInner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackrunBundlePoolInner")
            .field("by_target", &self.by_target)
            .finish()
    }
}

/// Backruns keyed by the hash of the transaction they follow.
///
/// Cheap to clone; clones share the same pool.
#[derive(Debug, Clone)]
pub struct BackrunBundlePool<T> {
    inner: Arc<BackrunBundlePoolInner<T>>,
}

impl<T: BuilderTx> BackrunBundlePool<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BackrunBundlePoolInner {
                by_target: DashMap::new(),
                metrics: Default::default(),
            }),
        }
    }

    /// Adds a backrun. Returns `false` if the same backrun is already pooled for
    /// that target.
    pub fn add_bundle(&self, bundle: BackrunBundle<T>) -> bool {
        let added = self
            .inner
            .by_target
            .entry(bundle.target_tx_hash)
            .or_default()
            .bundles
            .insert(OrderedBackrunBundle(bundle));
        if added {
            self.inner.metrics.backrun_bundles_added.increment(1);
            self.inner.metrics.backrun_bundle_count.increment(1.0);
        }
        added
    }

    pub fn get_backruns(&self, target_tx_hash: &B256) -> Option<TxBackruns<T>> {
        self.inner.by_target.get(target_tx_hash).map(|r| r.clone())
    }

    /// Drops every backrun anchored on one of `targets`, typically the
    /// transactions of a sealed block. Returns the number of removed backruns.
    pub fn remove_targets<'a>(&self, targets: impl IntoIterator<Item = &'a B256>) -> usize {
        let removed: usize = targets
            .into_iter()
            .filter_map(|target| self.inner.by_target.remove(target))
            .map(|(_, backruns)| backruns.bundles.len())
            .sum();

        let metrics = &self.inner.metrics;
        metrics.backrun_bundles_removed.increment(removed as u64);
        metrics.backrun_bundle_count.decrement(removed as f64);
        removed
    }

    /// Total number of pooled backruns.
    pub fn len(&self) -> usize {
        self.inner
            .by_target
            .iter()
            .map(|entry| entry.bundles.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.by_target.is_empty()
    }

    pub(super) fn metrics(&self) -> &BackrunPoolMetrics {
        &self.inner.metrics
    }
}

impl<T: BuilderTx> Default for BackrunBundlePool<T> {
    fn default() -> Self {
        Self::new()
    }
}
