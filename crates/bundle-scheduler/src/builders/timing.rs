use core::time::Duration;
use tokio::{runtime::Handle, sync::watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle on the unit the execution loop is currently running.
#[derive(Debug, Clone)]
pub(super) struct InFlightUnit {
    pub(super) cancel: CancellationToken,
    /// False for the first unit of a pass and for bundles.
    pub(super) cancellable: bool,
}

/// Enforces the wall clock budget of one pass.
///
/// A supervisor task sleeps for the budget, then flags the pass as expired and
/// cancels the in-flight unit if it may be cancelled. The loop talks to it through
/// a one slot mailbox, and dropping the budget tells the supervisor the pass is
/// over.
#[derive(Debug)]
pub(super) struct TimeBudget {
    slot: watch::Sender<Option<InFlightUnit>>,
    expired: CancellationToken,
    done: CancellationToken,
}

impl TimeBudget {
    pub(super) fn start(handle: &Handle, budget: Duration) -> Self {
        let (slot, in_flight) = watch::channel(None);
        let expired = CancellationToken::new();
        let done = CancellationToken::new();

        handle.spawn(supervise(budget, in_flight, expired.clone(), done.clone()));

        Self {
            slot,
            expired,
            done,
        }
    }

    /// Publishes the unit about to run, replacing the previous one.
    pub(super) fn begin_unit(&self, unit: InFlightUnit) {
        self.slot.send_replace(Some(unit));
    }

    pub(super) fn end_unit(&self) {
        self.slot.send_replace(None);
    }

    pub(super) fn is_expired(&self) -> bool {
        self.expired.is_cancelled()
    }
}

impl Drop for TimeBudget {
    fn drop(&mut self) {
        self.done.cancel();
    }
}

async fn supervise(
    budget: Duration,
    in_flight: watch::Receiver<Option<InFlightUnit>>,
    expired: CancellationToken,
    done: CancellationToken,
) {
    tokio::select! {
        _ = tokio::time::sleep(budget) => {
            expired.cancel();

            let unit = in_flight.borrow().clone();
            match unit {
                Some(unit) if unit.cancellable => {
                    debug!(target: "payload_builder", ?budget, "Time budget exhausted, cancelling in-flight unit");
                    unit.cancel.cancel();
                }
                Some(_) => {
                    debug!(target: "payload_builder", ?budget, "Time budget exhausted, letting in-flight unit finish");
                }
                None => {
                    debug!(target: "payload_builder", ?budget, "Time budget exhausted");
                }
            }
        }
        _ = done.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for(token: &CancellationToken, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, token.cancelled()).await.is_ok()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cancels_cancellable_unit() {
        let budget = TimeBudget::start(&Handle::current(), Duration::from_millis(10));
        let unit = CancellationToken::new();
        budget.begin_unit(InFlightUnit {
            cancel: unit.clone(),
            cancellable: true,
        });

        assert!(wait_for(&unit, Duration::from_secs(2)).await);
        assert!(budget.is_expired());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_spares_protected_unit() {
        let budget = TimeBudget::start(&Handle::current(), Duration::from_millis(10));
        let unit = CancellationToken::new();
        budget.begin_unit(InFlightUnit {
            cancel: unit.clone(),
            cancellable: false,
        });

        assert!(wait_for(&budget.expired, Duration::from_secs(2)).await);
        assert!(!unit.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finished_pass_stops_supervisor() {
        let budget = TimeBudget::start(&Handle::current(), Duration::from_millis(20));
        let expired = budget.expired.clone();
        let unit = CancellationToken::new();
        budget.begin_unit(InFlightUnit {
            cancel: unit.clone(),
            cancellable: true,
        });
        drop(budget);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!expired.is_cancelled());
        assert!(!unit.is_cancelled());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ended_unit_is_not_cancelled() {
        let budget = TimeBudget::start(&Handle::current(), Duration::from_millis(10));
        let unit = CancellationToken::new();
        budget.begin_unit(InFlightUnit {
            cancel: unit.clone(),
            cancellable: true,
        });
        budget.end_unit();

        assert!(wait_for(&budget.expired, Duration::from_secs(2)).await);
        assert!(!unit.is_cancelled());
    }
}
