//! Linear schedule consumed by the execution loop, and the two primitives used to
//! remove entries from its head.
//!
//! - [`Schedule::shift`] drops the first `n` entries and nothing else.
//! - [`Schedule::pop`] drops the first `n` entries together with everything that
//!   depends on them: later entries of the same sender and the other members of
//!   their bundles. Surviving bundles are then re-anchored on whatever precedes
//!   them, a target-required bundle whose anchor changed is left to the execution
//!   loop to discard.
//!
//! Dependency indices are derived from the schedule on every `pop` and thrown away
//! afterwards, the schedule itself is the only source of truth.
use alloy_primitives::{Address, B256};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use crate::{
    error::SignerError,
    primitives::bundle::Bundle,
    traits::SenderRecovery,
    tx::{BuilderTx, TxOrGen},
};

/// Ordered entries awaiting execution plus the bundles accepted for this pass.
#[derive(Debug, Clone)]
pub struct Schedule<T> {
    txs: Vec<TxOrGen<T>>,
    /// Sender of each concrete entry, parallel to `txs`.
    senders: Vec<Option<Address>>,
    bundles: Vec<Bundle<T>>,
}

/// Summary of a [`Schedule::pop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopOutcome {
    /// Entries removed, including the cascaded ones.
    pub evicted: usize,
    /// Bundles dropped from the bundle set.
    pub dropped_bundles: usize,
}

impl<T: BuilderTx> Schedule<T> {
    /// Resolves the sender of every concrete entry up front, so eviction never
    /// has to deal with recovery failures.
    pub fn new<S>(
        txs: Vec<TxOrGen<T>>,
        bundles: Vec<Bundle<T>>,
        signer: &S,
    ) -> Result<Self, SignerError>
    where
        S: SenderRecovery<T> + ?Sized,
    {
        let senders = txs
            .iter()
            .map(|entry| entry.as_tx().map(|tx| signer.sender_of(tx)).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            txs,
            senders,
            bundles,
        })
    }

    pub fn txs(&self) -> &[TxOrGen<T>] {
        &self.txs
    }

    pub fn bundles(&self) -> &[Bundle<T>] {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn head(&self) -> Option<&TxOrGen<T>> {
        self.txs.first()
    }

    /// Accepted bundle containing `id`, if any.
    pub fn bundle_of(&self, id: &B256) -> Option<&Bundle<T>> {
        self.bundles.iter().find(|bundle| bundle.contains(id))
    }

    /// Bundle the head entry belongs to.
    pub fn bundle_at_head(&self) -> Option<&Bundle<T>> {
        self.head().and_then(|head| self.bundle_of(&head.id()))
    }

    /// Unconditionally removes the first `n` entries.
    ///
    /// Bundles whose first member left the schedule are dropped from the set.
    /// Returns the number of removed entries.
    pub fn shift(&mut self, n: usize) -> usize {
        let n = n.min(self.txs.len());
        self.txs.drain(..n);
        self.senders.drain(..n);

        let remaining: HashSet<B256> = self.txs.iter().map(TxOrGen::id).collect();
        self.bundles.retain(|bundle| {
            bundle
                .first_id()
                .is_some_and(|first| remaining.contains(&first))
        });
        n
    }

    /// Removes the first `n` entries and cascades the removal to everything that
    /// depends on them, then re-anchors the surviving bundles.
    pub fn pop(&mut self, n: usize) -> PopOutcome {
        let len = self.txs.len();
        let n = n.min(len);
        if n == 0 {
            return PopOutcome::default();
        }

        let deps = DependencyIndex::build(&self.txs, &self.senders, &self.bundles);
        let mut marked = vec![false; len];
        let mut queue: VecDeque<usize> = (0..n).collect();
        marked[..n].fill(true);

        deps.cascade(&mut marked, &mut queue);

        let evicted = marked.iter().filter(|m| **m).count();
        let txs = std::mem::take(&mut self.txs);
        let senders = std::mem::take(&mut self.senders);
        (self.txs, self.senders) = txs
            .into_iter()
            .zip(senders)
            .zip(&marked)
            .filter(|(_, evicted)| !**evicted)
            .map(|(entry, _)| entry)
            .unzip();

        let bundles_before = self.bundles.len();
        let bundles = std::mem::take(&mut self.bundles);
        self.bundles = bundles
            .into_iter()
            .enumerate()
            .filter(|(bundle_idx, _)| {
                let members = &deps.bundle_members[*bundle_idx];
                // atomic: a bundle that lost any member is gone entirely
                !members.is_empty() && members.iter().all(|&member| !marked[member])
            })
            .map(|(_, bundle)| bundle)
            .collect();
        let dropped_bundles = bundles_before - self.bundles.len();

        self.reanchor_bundles();

        debug!(
            target: "payload_builder",
            requested = n,
            evicted,
            dropped_bundles,
            remaining = self.txs.len(),
            "Popped schedule head"
        );

        PopOutcome {
            evicted,
            dropped_bundles,
        }
    }

    /// Points every surviving bundle at the entry now directly preceding it, or at
    /// zero when it opens the schedule.
    fn reanchor_bundles(&mut self) {
        let position: HashMap<B256, usize> = self
            .txs
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.id(), idx))
            .collect();

        for bundle in &mut self.bundles {
            let Some(first) = bundle.first_id().and_then(|id| position.get(&id).copied()) else {
                continue;
            };
            bundle.target_tx_hash = match first {
                0 => B256::ZERO,
                idx => self.txs[idx - 1].id(),
            };
        }
    }
}

/// Adjacency derived from a schedule for a single eviction decision.
#[derive(Debug)]
struct DependencyIndex {
    senders: Vec<Option<Address>>,
    /// sender -> ascending indices of its concrete entries
    by_sender: HashMap<Address, Vec<usize>>,
    /// bundle ordinal -> ascending indices of its members
    bundle_members: Vec<Vec<usize>>,
    /// entry index -> bundle ordinal
    entry_bundle: Vec<Option<usize>>,
}

impl DependencyIndex {
    fn build<T: BuilderTx>(
        txs: &[TxOrGen<T>],
        senders: &[Option<Address>],
        bundles: &[Bundle<T>],
    ) -> Self {
        let position: HashMap<B256, usize> = txs
            .iter()
            .enumerate()
            .map(|(idx, entry)| (entry.id(), idx))
            .collect();

        let mut by_sender: HashMap<Address, Vec<usize>> = HashMap::new();
        for (idx, sender) in senders.iter().enumerate() {
            if let Some(sender) = sender {
                by_sender.entry(*sender).or_default().push(idx);
            }
        }

        let mut bundle_members = vec![Vec::new(); bundles.len()];
        let mut entry_bundle = vec![None; txs.len()];
        for (bundle_idx, bundle) in bundles.iter().enumerate() {
            for member in bundle.txs() {
                if let Some(&idx) = position.get(&member.id()) {
                    bundle_members[bundle_idx].push(idx);
                    entry_bundle[idx] = Some(bundle_idx);
                }
            }
            bundle_members[bundle_idx].sort_unstable();
        }

        Self {
            senders: senders.to_vec(),
            by_sender,
            bundle_members,
            entry_bundle,
        }
    }

    /// Marks everything reachable from the queued indices.
    fn cascade(&self, marked: &mut [bool], queue: &mut VecDeque<usize>) {
        while let Some(idx) = queue.pop_front() {
            // later nonces of the same sender can not be valid anymore
            if let Some(sender_entries) = self.senders[idx].and_then(|s| self.by_sender.get(&s)) {
                for &later in sender_entries.iter().filter(|&&later| later > idx) {
                    mark(later, marked, queue);
                }
            }

            if let Some(bundle_idx) = self.entry_bundle[idx] {
                for &member in &self.bundle_members[bundle_idx] {
                    mark(member, marked, queue);
                }
            }
        }
    }
}

fn mark(idx: usize, marked: &mut [bool], queue: &mut VecDeque<usize>) {
    if !marked[idx] {
        marked[idx] = true;
        queue.push_back(idx);
    }
}
