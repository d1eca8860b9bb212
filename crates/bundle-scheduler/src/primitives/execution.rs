//! Bookkeeping of a block building pass, generic over the transaction and
//! receipt types of the executor.
use alloy_primitives::B256;
use core::fmt::{self, Display};

/// Result of applying one transaction on top of the current state.
#[derive(Debug, Clone)]
pub struct AppliedTx<R> {
    pub receipt: R,
    pub gas_used: u64,
    /// Receipt status. A failed transaction is still included in the block.
    pub success: bool,
}

/// Identity and status of the most recently committed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedTx {
    /// Schedule id of the entry, which is the generator id for generated transactions.
    pub id: B256,
    pub success: bool,
}

/// Accumulated output of one block building pass.
#[derive(Debug)]
pub struct ExecutionInfo<T, R> {
    /// All committed transactions, in block order.
    pub executed_transactions: Vec<T>,
    /// Receipts, parallel to `executed_transactions`.
    pub receipts: Vec<R>,
    /// All gas used so far
    pub cumulative_gas_used: u64,
    /// Number of committed transactions.
    pub num_committed: usize,
    /// Last committed entry, used to gate target-required bundles.
    pub last_committed: Option<CommittedTx>,
    /// Number of bundles committed as a whole.
    pub num_bundles_committed: usize,
}

/// Saved view of an [`ExecutionInfo`] taken before a bundle starts.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionCheckpoint {
    num_transactions: usize,
    cumulative_gas_used: u64,
    num_committed: usize,
    last_committed: Option<CommittedTx>,
}

impl<T, R> Default for ExecutionInfo<T, R> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T, R> ExecutionInfo<T, R> {
    /// Create a new instance with allocated slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            executed_transactions: Vec::with_capacity(capacity),
            receipts: Vec::with_capacity(capacity),
            cumulative_gas_used: 0,
            num_committed: 0,
            last_committed: None,
            num_bundles_committed: 0,
        }
    }

    /// Records a committed transaction.
    pub fn commit(&mut self, id: B256, tx: T, receipt: R, gas_used: u64, success: bool) {
        self.cumulative_gas_used += gas_used;
        self.num_committed += 1;
        self.last_committed = Some(CommittedTx { id, success });
        self.executed_transactions.push(tx);
        self.receipts.push(receipt);
    }

    pub fn checkpoint(&self) -> ExecutionCheckpoint {
        ExecutionCheckpoint {
            num_transactions: self.executed_transactions.len(),
            cumulative_gas_used: self.cumulative_gas_used,
            num_committed: self.num_committed,
            last_committed: self.last_committed,
        }
    }

    /// Drops everything recorded after `checkpoint` was taken.
    pub fn restore(&mut self, checkpoint: ExecutionCheckpoint) {
        self.executed_transactions
            .truncate(checkpoint.num_transactions);
        self.receipts.truncate(checkpoint.num_transactions);
        self.cumulative_gas_used = checkpoint.cumulative_gas_used;
        self.num_committed = checkpoint.num_committed;
        self.last_committed = checkpoint.last_committed;
    }
}

/// Outcome of a unit, logged by the execution loop.
#[derive(Debug)]
pub enum TxnExecutionResult {
    Success,
    Reverted,
    BundleCommitted(usize),
    BundleDiscarded,
    NonceTooLow,
    Evicted(String),
    Skipped(String),
    TimeLimitReached,
}

impl Display for TxnExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnExecutionResult::Success => write!(f, "Success"),
            TxnExecutionResult::Reverted => write!(f, "Reverted"),
            TxnExecutionResult::BundleCommitted(len) => write!(f, "BundleCommitted({len})"),
            TxnExecutionResult::BundleDiscarded => write!(f, "BundleDiscarded"),
            TxnExecutionResult::NonceTooLow => write!(f, "NonceTooLow"),
            TxnExecutionResult::Evicted(reason) => write!(f, "Evicted: {reason}"),
            TxnExecutionResult::Skipped(reason) => write!(f, "Skipped: {reason}"),
            TxnExecutionResult::TimeLimitReached => write!(f, "TimeLimitReached"),
        }
    }
}
