use core::fmt::Debug;
use std::{sync::Arc, time::Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::timing::{InFlightUnit, TimeBudget};
use crate::{
    args::SchedulerArgs,
    bundling::extract_and_incorporate,
    error::{BuilderError, EvictionAction, ExecutionError},
    metrics::SchedulerMetrics,
    primitives::{
        bundle::Bundle,
        execution::{CommittedTx, ExecutionInfo, TxnExecutionResult},
        schedule::Schedule,
    },
    traits::{BlockExecutor, BundlingExtension, SenderRecovery},
    tx::{BuilderTx, TxOrGen},
};

/// Everything one block building pass needs besides the pending transactions and
/// the state it executes against.
pub struct BlockBuilderCtx<T: BuilderTx, S> {
    pub args: SchedulerArgs,
    /// The metrics for the builder
    pub metrics: Arc<SchedulerMetrics>,
    /// Marker to check whether the job has been cancelled.
    pub cancel: CancellationToken,
    pub signer: S,
    /// Bundling extensions, in the order they are consulted.
    pub extensions: Vec<Arc<dyn BundlingExtension<T>>>,
}

impl<T: BuilderTx, S: Debug> Debug for BlockBuilderCtx<T, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockBuilderCtx")
            .field("args", &self.args)
            .field("cancel", &self.cancel)
            .field("signer", &self.signer)
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Why the execution loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Drained,
    TimeLimitReached,
    Cancelled,
}

impl<T: BuilderTx, S: SenderRecovery<T>> BlockBuilderCtx<T, S> {
    pub fn new(args: SchedulerArgs, signer: S) -> Self {
        Self {
            args,
            metrics: Default::default(),
            cancel: CancellationToken::new(),
            signer,
            extensions: Vec::new(),
        }
    }

    pub fn with_cancel(self, cancel: CancellationToken) -> Self {
        Self { cancel, ..self }
    }

    pub fn with_extension(mut self, extension: Arc<dyn BundlingExtension<T>>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Runs one pass: collects bundles, builds the schedule and executes it against
    /// `executor` until it drains, the time budget runs out or the job is cancelled.
    ///
    /// Must be called from within a tokio runtime, the time budget supervisor runs
    /// on it. The call itself blocks, so async callers should use `spawn_blocking`.
    pub fn build<E>(
        &self,
        pending: &[T],
        executor: &mut E,
    ) -> Result<ExecutionInfo<T, E::Receipt>, BuilderError>
    where
        E: BlockExecutor<T>,
    {
        let handle = Handle::try_current().map_err(|_| BuilderError::MissingRuntime)?;

        let extensions: &[Arc<dyn BundlingExtension<T>>] = if self.args.bundles_enabled {
            &self.extensions
        } else {
            &[]
        };
        let (txs, bundles) = extract_and_incorporate(
            pending,
            extensions,
            self.args.max_bundles_per_block,
            &self.metrics,
        );
        let mut schedule = Schedule::new(txs, bundles, &self.signer)?;
        self.metrics.schedule_length.record(schedule.len() as f64);

        let mut info = ExecutionInfo::with_capacity(schedule.len());
        let started = Instant::now();
        let budget = TimeBudget::start(&handle, self.args.time_budget());
        let reason = self.execute_schedule(&mut schedule, &budget, executor, &mut info);
        // tears the supervisor down
        drop(budget);

        let elapsed = started.elapsed();
        self.metrics.pass_duration.record(elapsed);
        if reason == StopReason::TimeLimitReached {
            self.metrics.time_budget_aborts.increment(1);
        }
        info!(
            target: "payload_builder",
            ?reason,
            txs_committed = info.num_committed,
            bundles_committed = info.num_bundles_committed,
            gas_used = info.cumulative_gas_used,
            remaining = schedule.len(),
            ?elapsed,
            "Finished block building pass"
        );

        Ok(info)
    }

    fn execute_schedule<E>(
        &self,
        schedule: &mut Schedule<T>,
        budget: &TimeBudget,
        executor: &mut E,
        info: &mut ExecutionInfo<T, E::Receipt>,
    ) -> StopReason
    where
        E: BlockExecutor<T>,
    {
        let _execute_span = tracing::info_span!(
            "execute_schedule",
            num_entries = schedule.len(),
            num_bundles = schedule.bundles().len()
        )
        .entered();

        while let Some(head) = schedule.head().cloned() {
            // check if the job was cancelled, if so we can exit early
            if self.cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            if budget.is_expired() {
                return StopReason::TimeLimitReached;
            }

            let head_id = head.id();
            let bundle = schedule.bundle_at_head().cloned();
            let num_shift = bundle.as_ref().map_or(1, Bundle::len);

            let log_unit = |result: TxnExecutionResult| {
                debug!(
                    target: "payload_builder",
                    message = "Considering schedule entry",
                    id = ?head_id,
                    is_generator = head.is_generator(),
                    num_shift,
                    result = %result,
                );
            };

            if let Some(bundle) = &bundle
                && should_discard_bundle(bundle, info.last_committed)
            {
                log_unit(TxnExecutionResult::BundleDiscarded);
                self.metrics.bundles_reverted.increment(1);
                self.pop(schedule, num_shift);
                continue;
            }

            let unit_cancel = self.cancel.child_token();
            budget.begin_unit(InFlightUnit {
                cancel: unit_cancel.clone(),
                // never the first unit of a pass, never a bundle
                cancellable: bundle.is_none() && info.num_committed > 0,
            });
            let result = match &bundle {
                Some(bundle) => self.execute_bundle(bundle, executor, info, &unit_cancel),
                None => self.execute_single(&head, executor, info, &unit_cancel),
            };
            budget.end_unit();

            let err = match result {
                Ok(result) => {
                    log_unit(result);
                    self.shift(schedule, num_shift);
                    continue;
                }
                Err(err) => err,
            };

            match err.action(num_shift) {
                EvictionAction::Shift(n) => {
                    if let ExecutionError::NonceTooLow { .. } = err {
                        log_unit(TxnExecutionResult::NonceTooLow);
                    } else {
                        warn!(target: "payload_builder", id = ?head_id, %err, "Skipping entry after unexpected error");
                        log_unit(TxnExecutionResult::Skipped(err.to_string()));
                    }
                    self.shift(schedule, n);
                }
                EvictionAction::Pop(n) => {
                    log_unit(TxnExecutionResult::Evicted(err.to_string()));
                    if bundle.is_some() {
                        self.metrics.bundles_reverted.increment(1);
                    }
                    self.pop(schedule, n);
                }
                EvictionAction::Abort => {
                    // the loop only ever sees the unit token cancelled
                    return if budget.is_expired() {
                        log_unit(TxnExecutionResult::TimeLimitReached);
                        StopReason::TimeLimitReached
                    } else {
                        StopReason::Cancelled
                    };
                }
            }
        }

        StopReason::Drained
    }

    fn execute_single<E>(
        &self,
        entry: &TxOrGen<T>,
        executor: &mut E,
        info: &mut ExecutionInfo<T, E::Receipt>,
        cancel: &CancellationToken,
    ) -> Result<TxnExecutionResult, ExecutionError>
    where
        E: BlockExecutor<T>,
    {
        let tx = materialize(entry, executor)?;

        let snapshot = executor.snapshot();
        let applied = match executor.apply_transaction(&tx, cancel) {
            Ok(applied) => applied,
            Err(err) => {
                executor.revert_to_snapshot(snapshot);
                return Err(err);
            }
        };

        self.metrics.txs_committed.increment(1);
        let result = if applied.success {
            TxnExecutionResult::Success
        } else {
            TxnExecutionResult::Reverted
        };
        info.commit(
            entry.id(),
            tx,
            applied.receipt,
            applied.gas_used,
            applied.success,
        );
        Ok(result)
    }

    /// Applies every member of `bundle` or none of them.
    fn execute_bundle<E>(
        &self,
        bundle: &Bundle<T>,
        executor: &mut E,
        info: &mut ExecutionInfo<T, E::Receipt>,
        cancel: &CancellationToken,
    ) -> Result<TxnExecutionResult, ExecutionError>
    where
        E: BlockExecutor<T>,
    {
        let checkpoint = info.checkpoint();
        let snapshot = executor.snapshot();

        for member in bundle.txs() {
            let id = member.id();
            let result = materialize(member, executor).and_then(|tx| {
                let applied = executor.apply_transaction(&tx, cancel)?;
                Ok((tx, applied))
            });

            let err = match result {
                Ok((tx, applied)) if applied.success => {
                    info.commit(id, tx, applied.receipt, applied.gas_used, true);
                    continue;
                }
                Ok(_) => ExecutionError::BundleReverted {
                    id,
                    reason: "transaction reverted".to_string(),
                },
                Err(
                    err @ (ExecutionError::GeneratorFailed(_)
                    | ExecutionError::Cancelled
                    | ExecutionError::TimeLimitReached),
                ) => err,
                Err(err) => ExecutionError::BundleReverted {
                    id,
                    reason: err.to_string(),
                },
            };

            executor.revert_to_snapshot(snapshot);
            info.restore(checkpoint);
            return Err(err);
        }

        info.num_bundles_committed += 1;
        self.metrics.txs_committed.increment(bundle.len() as u64);
        self.metrics.bundles_committed.increment(1);
        Ok(TxnExecutionResult::BundleCommitted(bundle.len()))
    }

    fn shift(&self, schedule: &mut Schedule<T>, n: usize) {
        let shifted = schedule.shift(n);
        self.metrics.entries_shifted.increment(shifted as u64);
    }

    fn pop(&self, schedule: &mut Schedule<T>, n: usize) {
        let outcome = schedule.pop(n);
        self.metrics.entries_popped.increment(outcome.evicted as u64);
    }
}

/// A bundle that requires its target may only run right after that target
/// committed successfully.
pub fn should_discard_bundle<T: BuilderTx>(
    bundle: &Bundle<T>,
    last_committed: Option<CommittedTx>,
) -> bool {
    if !bundle.target_required {
        return false;
    }
    match last_committed {
        None => !bundle.target_tx_hash.is_zero(),
        Some(last) => last.id != bundle.target_tx_hash || !last.success,
    }
}

/// Resolves an entry into a transaction, asking the executor for the nonce of the
/// generator's sender.
fn materialize<T, E>(entry: &TxOrGen<T>, executor: &mut E) -> Result<T, ExecutionError>
where
    T: BuilderTx,
    E: BlockExecutor<T>,
{
    match entry {
        TxOrGen::Tx(tx) => Ok(tx.clone()),
        TxOrGen::Gen(generator) => {
            let nonce = executor.nonce(generator.sender())?;
            Ok(generator.generate(nonce)?)
        }
    }
}
