use alloy_consensus::{TxEnvelope, transaction::SignerRecoverable};
use alloy_primitives::{Address, B256};
use core::fmt;
use std::sync::Arc;

use crate::{
    error::{GeneratorError, SignerError},
    traits::SenderRecovery,
};

/// A signed transaction the scheduler can place and hand to the executor.
pub trait BuilderTx: Clone + fmt::Debug + Send + Sync + 'static {
    /// Content hash of the signed transaction.
    fn tx_hash(&self) -> B256;

    /// Nonce the transaction was signed with.
    fn nonce(&self) -> u64;
}

impl BuilderTx for TxEnvelope {
    fn tx_hash(&self) -> B256 {
        *TxEnvelope::tx_hash(self)
    }

    fn nonce(&self) -> u64 {
        alloy_consensus::Transaction::nonce(self)
    }
}

/// Recovers the sender of a [`TxEnvelope`] from its signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeSigner;

impl SenderRecovery<TxEnvelope> for EnvelopeSigner {
    fn sender_of(&self, tx: &TxEnvelope) -> Result<Address, SignerError> {
        tx.recover_signer().map_err(|err| SignerError {
            tx_hash: *tx.tx_hash(),
            reason: err.to_string(),
        })
    }
}

type GenerateFn<T> = dyn Fn(u64) -> Result<T, GeneratorError> + Send + Sync;

/// Deferred transaction construction.
///
/// The generator is called with the current nonce of `sender` once the scheduler
/// reaches it, so bundling extensions can propose transactions whose nonce depends
/// on the final execution order.
#[derive(Clone)]
pub struct TxGenerator<T> {
    id: B256,
    sender: Address,
    generate: Arc<GenerateFn<T>>,
}

impl<T> TxGenerator<T> {
    /// `id` must be deterministic for the proposal: it is the identity used for
    /// membership, anchoring and eviction.
    pub fn new<F>(id: B256, sender: Address, generate: F) -> Self
    where
        F: Fn(u64) -> Result<T, GeneratorError> + Send + Sync + 'static,
    {
        Self {
            id,
            sender,
            generate: Arc::new(generate),
        }
    }

    pub fn id(&self) -> B256 {
        self.id
    }

    /// Account whose nonce is passed to the generator.
    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn generate(&self, nonce: u64) -> Result<T, GeneratorError> {
        (self.generate)(nonce)
    }
}

impl<T> fmt::Debug for TxGenerator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxGenerator")
            .field("id", &self.id)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// Either an already signed transaction or a generator producing one at placement time.
#[derive(Clone, Debug)]
pub enum TxOrGen<T> {
    Tx(T),
    Gen(TxGenerator<T>),
}

impl<T: BuilderTx> TxOrGen<T> {
    /// Stable identity of the entry: the tx hash for concrete transactions, the
    /// caller supplied id for generators.
    pub fn id(&self) -> B256 {
        match self {
            TxOrGen::Tx(tx) => tx.tx_hash(),
            TxOrGen::Gen(generator) => generator.id(),
        }
    }

    pub fn as_tx(&self) -> Option<&T> {
        match self {
            TxOrGen::Tx(tx) => Some(tx),
            TxOrGen::Gen(_) => None,
        }
    }

    pub fn is_generator(&self) -> bool {
        matches!(self, TxOrGen::Gen(_))
    }

    /// Resolves the entry into a concrete transaction. `nonce` is only consulted
    /// by generators.
    pub fn materialize(&self, nonce: u64) -> Result<T, GeneratorError> {
        match self {
            TxOrGen::Tx(tx) => Ok(tx.clone()),
            TxOrGen::Gen(generator) => generator.generate(nonce),
        }
    }
}

impl<T: BuilderTx> PartialEq for TxOrGen<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<T: BuilderTx> Eq for TxOrGen<T> {}

impl<T> From<T> for TxOrGen<T> {
    fn from(tx: T) -> Self {
        TxOrGen::Tx(tx)
    }
}

impl<T> From<TxGenerator<T>> for TxOrGen<T> {
    fn from(generator: TxGenerator<T>) -> Self {
        TxOrGen::Gen(generator)
    }
}
