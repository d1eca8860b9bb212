use alloy_primitives::{Address, B256};

/// Failure of a [`TxGenerator`](crate::tx::TxGenerator) to produce a transaction.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// The generator decided there is nothing to place.
    #[error("generator produced no transaction")]
    NoTransaction,
    /// Signing or building the transaction failed.
    #[error("failed to generate transaction: {0}")]
    Other(Box<dyn core::error::Error + Send + Sync>),
}

/// Sender recovery failure.
#[derive(Debug, thiserror::Error)]
#[error("failed to recover sender of transaction {tx_hash}: {reason}")]
pub struct SignerError {
    pub tx_hash: B256,
    pub reason: String,
}

/// Possible error variants while merging bundles into the flat transaction list.
#[derive(Debug, thiserror::Error)]
pub enum IncorporateError {
    /// No entry with the bundle's target id exists in the working sequence.
    #[error("failed to incorporate bundle: target {target} not found")]
    FailedToIncorporateBundle { target: B256 },
}

/// Errors surfaced while executing one unit (a single entry or a whole bundle).
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("nonce too low for {address}: tx {tx_nonce}, state {state_nonce}")]
    NonceTooLow {
        address: Address,
        tx_nonce: u64,
        state_nonce: u64,
    },
    #[error("nonce too high for {address}: tx {tx_nonce}, state {state_nonce}")]
    NonceTooHigh {
        address: Address,
        tx_nonce: u64,
        state_nonce: u64,
    },
    #[error("transaction type {0} not supported")]
    TxTypeNotSupported(u8),
    /// A bundle member failed or did not succeed; the whole bundle was reverted.
    #[error("bundle reverted at {id}: {reason}")]
    BundleReverted { id: B256, reason: String },
    #[error(transparent)]
    GeneratorFailed(#[from] GeneratorError),
    /// The executor observed the cancellation of the in-flight unit.
    #[error("execution cancelled")]
    Cancelled,
    #[error("time budget for the pass exhausted")]
    TimeLimitReached,
    /// Unrecoverable state access error or anything the loop has no policy for.
    #[error(transparent)]
    Other(Box<dyn core::error::Error + Send + Sync>),
}

/// What the execution loop does with the schedule after a unit finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionAction {
    /// Drop the first `n` entries, nothing else.
    Shift(usize),
    /// Drop the first `n` entries and everything depending on them.
    Pop(usize),
    /// Stop the pass, keeping what has been committed.
    Abort,
}

impl ExecutionError {
    /// Maps the error of a unit of `num_shift` entries to the eviction policy.
    pub fn action(&self, num_shift: usize) -> EvictionAction {
        match self {
            // the entry is behind the account, later entries may still be valid
            ExecutionError::NonceTooLow { .. } => EvictionAction::Shift(1),
            ExecutionError::NonceTooHigh { .. }
            | ExecutionError::TxTypeNotSupported(_)
            | ExecutionError::BundleReverted { .. }
            | ExecutionError::GeneratorFailed(_) => EvictionAction::Pop(num_shift),
            ExecutionError::Cancelled | ExecutionError::TimeLimitReached => EvictionAction::Abort,
            ExecutionError::Other(_) => EvictionAction::Shift(num_shift),
        }
    }

    pub fn other<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        ExecutionError::Other(Box::new(error))
    }
}

/// Pass level failures.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error(transparent)]
    SenderRecovery(#[from] SignerError),
    /// The time budget supervisor needs a tokio runtime to run on.
    #[error("no tokio runtime available for the time budget supervisor")]
    MissingRuntime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_table() {
        let address = Address::ZERO;

        assert_eq!(
            ExecutionError::NonceTooLow {
                address,
                tx_nonce: 0,
                state_nonce: 1
            }
            .action(3),
            EvictionAction::Shift(1)
        );
        assert_eq!(
            ExecutionError::NonceTooHigh {
                address,
                tx_nonce: 2,
                state_nonce: 1
            }
            .action(3),
            EvictionAction::Pop(3)
        );
        assert_eq!(
            ExecutionError::TxTypeNotSupported(3).action(1),
            EvictionAction::Pop(1)
        );
        assert_eq!(
            ExecutionError::BundleReverted {
                id: B256::ZERO,
                reason: "reverted".to_string()
            }
            .action(2),
            EvictionAction::Pop(2)
        );
        assert_eq!(
            ExecutionError::GeneratorFailed(GeneratorError::NoTransaction).action(2),
            EvictionAction::Pop(2)
        );
        assert_eq!(ExecutionError::Cancelled.action(1), EvictionAction::Abort);
        assert_eq!(
            ExecutionError::TimeLimitReached.action(4),
            EvictionAction::Abort
        );
        assert_eq!(
            ExecutionError::other(std::io::Error::other("db")).action(4),
            EvictionAction::Shift(4)
        );
    }
}
