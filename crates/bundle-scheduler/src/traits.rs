use alloy_primitives::Address;
use core::fmt::Debug;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ExecutionError, SignerError},
    primitives::{bundle::Bundle, execution::AppliedTx},
    tx::BuilderTx,
};

/// Mutable world state plus the transaction application logic, seen as a
/// transactional resource: snapshot before anything risky, revert on failure,
/// keep going otherwise.
pub trait BlockExecutor<T: BuilderTx> {
    type Receipt: Clone + Debug + Send;
    type SnapshotId: Copy + Debug;

    fn snapshot(&mut self) -> Self::SnapshotId;

    /// Discards every change made after `id` was taken.
    fn revert_to_snapshot(&mut self, id: Self::SnapshotId);

    /// Independent handle on the current state.
    ///
    /// The scheduler itself only relies on snapshots. Callers use the copy as a
    /// baseline to check that a discarded bundle left the state untouched, or to
    /// start a speculative pass from the same state.
    fn copy(&self) -> Self
    where
        Self: Sized;

    /// Current nonce of `address`, handed to generators.
    fn nonce(&mut self, address: Address) -> Result<u64, ExecutionError>;

    /// Applies `tx` on top of the current state.
    ///
    /// `cancel` is the handle the time budget supervisor holds on the in-flight
    /// call; implementations should poll it and bail out with
    /// [`ExecutionError::Cancelled`].
    fn apply_transaction(
        &mut self,
        tx: &T,
        cancel: &CancellationToken,
    ) -> Result<AppliedTx<Self::Receipt>, ExecutionError>;
}

/// Recovers the account that signed a transaction.
pub trait SenderRecovery<T> {
    fn sender_of(&self, tx: &T) -> Result<Address, SignerError>;
}

/// External module proposing bundles for the block being built.
///
/// Implementations must not assume anything about the order other extensions
/// are called in beyond registration order, and only ever return fresh bundles.
pub trait BundlingExtension<T: BuilderTx>: Debug + Send + Sync {
    /// Name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    /// Proposes bundles over `pending`, given the bundles already accepted this
    /// round by extensions registered earlier.
    fn extract_tx_bundles(&self, pending: &[T], accepted: &[Bundle<T>]) -> Vec<Bundle<T>>;
}
