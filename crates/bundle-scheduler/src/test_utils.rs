use alloy_primitives::{Address, B256, keccak256};
use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ExecutionError, GeneratorError, SignerError},
    primitives::{bundle::Bundle, execution::AppliedTx},
    traits::{BlockExecutor, BundlingExtension, SenderRecovery},
    tx::{BuilderTx, TxGenerator, TxOrGen},
};

pub(crate) const UNSUPPORTED_TX_TYPE: u8 = 0x7f;

/// Transaction whose execution outcome is scripted by its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockTx {
    pub(crate) sender: Address,
    pub(crate) nonce: u64,
    pub(crate) gas: u64,
    pub(crate) tx_type: u8,
    /// Commits with a failed status.
    pub(crate) reverts: bool,
    /// Fails with an unclassified error.
    pub(crate) broken: bool,
    /// Time spent in the executor.
    pub(crate) delay: Duration,
    /// Distinguishes otherwise identical transactions.
    pub(crate) tag: u64,
}

impl MockTx {
    pub(crate) fn new(sender: Address, nonce: u64) -> Self {
        Self {
            sender,
            nonce,
            gas: 21_000,
            tx_type: 2,
            reverts: false,
            broken: false,
            delay: Duration::ZERO,
            tag: 0,
        }
    }

    pub(crate) fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub(crate) fn with_tx_type(mut self, tx_type: u8) -> Self {
        self.tx_type = tx_type;
        self
    }

    pub(crate) fn reverting(mut self) -> Self {
        self.reverts = true;
        self
    }

    pub(crate) fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_tag(mut self, tag: u64) -> Self {
        self.tag = tag;
        self
    }
}

impl BuilderTx for MockTx {
    fn tx_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(self.sender.as_slice());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf.extend_from_slice(&self.gas.to_be_bytes());
        buf.push(self.tx_type);
        buf.push(self.reverts as u8);
        buf.push(self.broken as u8);
        buf.extend_from_slice(&(self.delay.as_millis() as u64).to_be_bytes());
        buf.extend_from_slice(&self.tag.to_be_bytes());
        keccak256(buf)
    }

    fn nonce(&self) -> u64 {
        self.nonce
    }
}

/// Generator entry producing a [`MockTx`] from `sender` with the supplied nonce.
pub(crate) fn mock_generator(id: B256, sender: Address) -> TxOrGen<MockTx> {
    TxOrGen::Gen(TxGenerator::new(id, sender, move |nonce| {
        Ok(MockTx::new(sender, nonce))
    }))
}

/// Generator entry that never produces a transaction.
pub(crate) fn failing_generator(id: B256, sender: Address) -> TxOrGen<MockTx> {
    TxOrGen::Gen(TxGenerator::new(id, sender, |_| {
        Err(GeneratorError::NoTransaction)
    }))
}

pub(crate) fn entries(txs: &[MockTx]) -> Vec<TxOrGen<MockTx>> {
    txs.iter().cloned().map(TxOrGen::Tx).collect()
}

pub(crate) fn ids(entries: &[TxOrGen<MockTx>]) -> Vec<B256> {
    entries.iter().map(TxOrGen::id).collect()
}

pub(crate) fn mock_bundle(members: &[MockTx], target: B256, required: bool) -> Bundle<MockTx> {
    Bundle::new(entries(members), target, required)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockReceipt {
    pub(crate) tx_hash: B256,
    pub(crate) success: bool,
    pub(crate) gas_used: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MockState {
    nonces: HashMap<Address, u64>,
    applied: Vec<B256>,
}

/// In-memory executor tracking nonces and the list of applied transactions.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockExecutor {
    state: MockState,
    snapshots: Vec<MockState>,
}

impl MockExecutor {
    pub(crate) fn with_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.state.nonces.insert(address, nonce);
        self
    }

    pub(crate) fn applied(&self) -> &[B256] {
        &self.state.applied
    }

    pub(crate) fn account_nonce(&self, address: Address) -> u64 {
        self.state.nonces.get(&address).copied().unwrap_or_default()
    }

    /// Compares world state, ignoring open snapshots.
    pub(crate) fn same_state(&self, other: &MockExecutor) -> bool {
        self.state == other.state
    }
}

impl BlockExecutor<MockTx> for MockExecutor {
    type Receipt = MockReceipt;
    type SnapshotId = usize;

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.state.clone());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        self.state = self.snapshots[id].clone();
        self.snapshots.truncate(id);
    }

    fn copy(&self) -> Self {
        Self {
            state: self.state.clone(),
            snapshots: Vec::new(),
        }
    }

    fn nonce(&mut self, address: Address) -> Result<u64, ExecutionError> {
        Ok(self.account_nonce(address))
    }

    fn apply_transaction(
        &mut self,
        tx: &MockTx,
        cancel: &CancellationToken,
    ) -> Result<AppliedTx<MockReceipt>, ExecutionError> {
        let started = Instant::now();
        while started.elapsed() < tx.delay {
            if cancel.is_cancelled() {
                return Err(ExecutionError::Cancelled);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        if cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        if tx.tx_type == UNSUPPORTED_TX_TYPE {
            return Err(ExecutionError::TxTypeNotSupported(tx.tx_type));
        }

        let state_nonce = self.account_nonce(tx.sender);
        if tx.nonce < state_nonce {
            return Err(ExecutionError::NonceTooLow {
                address: tx.sender,
                tx_nonce: tx.nonce,
                state_nonce,
            });
        }
        if tx.nonce > state_nonce {
            return Err(ExecutionError::NonceTooHigh {
                address: tx.sender,
                tx_nonce: tx.nonce,
                state_nonce,
            });
        }
        if tx.broken {
            return Err(ExecutionError::other(std::io::Error::other(
                "mock state access failure",
            )));
        }

        self.state.nonces.insert(tx.sender, state_nonce + 1);
        self.state.applied.push(tx.tx_hash());

        let success = !tx.reverts;
        Ok(AppliedTx {
            receipt: MockReceipt {
                tx_hash: tx.tx_hash(),
                success,
                gas_used: tx.gas,
            },
            gas_used: tx.gas,
            success,
        })
    }
}

/// Reads the sender off the transaction, failing for the configured hashes.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockSigner {
    unrecoverable: HashSet<B256>,
}

impl MockSigner {
    pub(crate) fn failing_for(mut self, tx_hash: B256) -> Self {
        self.unrecoverable.insert(tx_hash);
        self
    }
}

impl SenderRecovery<MockTx> for MockSigner {
    fn sender_of(&self, tx: &MockTx) -> Result<Address, SignerError> {
        let tx_hash = tx.tx_hash();
        if self.unrecoverable.contains(&tx_hash) {
            return Err(SignerError {
                tx_hash,
                reason: "invalid signature".to_string(),
            });
        }
        Ok(tx.sender)
    }
}

/// Extension returning a fixed list of proposals and recording what it saw.
#[derive(Debug)]
pub(crate) struct FixedExtension {
    pub(crate) name: &'static str,
    pub(crate) proposals: Vec<Bundle<MockTx>>,
    pub(crate) seen_accepted: std::sync::Mutex<Vec<usize>>,
}

impl FixedExtension {
    pub(crate) fn new(name: &'static str, proposals: Vec<Bundle<MockTx>>) -> Self {
        Self {
            name,
            proposals,
            seen_accepted: Default::default(),
        }
    }
}

impl BundlingExtension<MockTx> for FixedExtension {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract_tx_bundles(
        &self,
        _pending: &[MockTx],
        accepted: &[Bundle<MockTx>],
    ) -> Vec<Bundle<MockTx>> {
        self.seen_accepted.lock().unwrap().push(accepted.len());
        self.proposals.clone()
    }
}
