use alloy_primitives::B256;
use std::{collections::HashMap, sync::OnceLock};

use crate::tx::{BuilderTx, TxOrGen};

/// An ordered group of entries that executes atomically and contiguously right
/// after `target_tx_hash` (or at the front of the block when it is zero).
#[derive(Debug, Clone)]
pub struct Bundle<T> {
    txs: Vec<TxOrGen<T>>,
    /// Id of the entry the bundle is anchored after. Zero means front of the block.
    pub target_tx_hash: B256,
    /// The bundle is only valid if it directly follows a successful `target_tx_hash`.
    pub target_required: bool,
    /// id -> position in `txs`, built on first lookup.
    index: OnceLock<HashMap<B256, usize>>,
}

impl<T: BuilderTx> Bundle<T> {
    pub fn new(txs: Vec<TxOrGen<T>>, target_tx_hash: B256, target_required: bool) -> Self {
        Self {
            txs,
            target_tx_hash,
            target_required,
            index: OnceLock::new(),
        }
    }

    /// A bundle with no members, only encoding a claim on `target_tx_hash`.
    pub fn anchor_only(target_tx_hash: B256, target_required: bool) -> Self {
        Self::new(Vec::new(), target_tx_hash, target_required)
    }

    pub fn txs(&self) -> &[TxOrGen<T>] {
        &self.txs
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    fn index(&self) -> &HashMap<B256, usize> {
        self.index.get_or_init(|| {
            self.txs
                .iter()
                .enumerate()
                .map(|(position, tx)| (tx.id(), position))
                .collect()
        })
    }

    /// Position of the member with the given id.
    pub fn position(&self, id: &B256) -> Option<usize> {
        self.index().get(id).copied()
    }

    pub fn contains(&self, id: &B256) -> bool {
        self.index().contains_key(id)
    }

    pub fn first_id(&self) -> Option<B256> {
        self.txs.first().map(TxOrGen::id)
    }

    pub fn last_id(&self) -> Option<B256> {
        self.txs.last().map(TxOrGen::id)
    }

    /// Returns true if placing `target` after a member of this bundle would break
    /// the bundle apart, i.e. the target sits strictly before its last member.
    fn is_split_by(&self, target: &B256) -> bool {
        self.position(target)
            .is_some_and(|position| position + 1 < self.txs.len())
    }

    /// Whether `self` and `other` can not both be accepted for the same block.
    ///
    /// The outcome does not depend on the argument order.
    pub fn is_conflict(&self, other: &Bundle<T>) -> bool {
        // a single exclusive claim per anchor
        if self.target_required
            && other.target_required
            && self.target_tx_hash == other.target_tx_hash
        {
            return true;
        }

        // nothing to place, so nothing to overlap with or split
        if self.is_empty() || other.is_empty() {
            return false;
        }

        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        if smaller.txs.iter().any(|tx| larger.contains(&tx.id())) {
            return true;
        }

        self.is_split_by(&other.target_tx_hash) || other.is_split_by(&self.target_tx_hash)
    }
}

/// Returns true if `candidate` conflicts with any bundle of `accepted`.
pub fn conflicts_with_any<T: BuilderTx>(accepted: &[Bundle<T>], candidate: &Bundle<T>) -> bool {
    accepted.iter().any(|bundle| bundle.is_conflict(candidate))
}
