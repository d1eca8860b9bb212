use crate::{
    error::IncorporateError,
    primitives::bundle::Bundle,
    tx::{BuilderTx, TxOrGen},
};

/// Merges the flat transaction list with a conflict free set of bundles.
///
/// Bundles are placed in input order, each one right after the entry whose id
/// equals its target (or at the front for the zero target), in the sequence
/// produced by the bundles placed before it. Loose copies of bundle members are
/// not emitted twice.
///
/// Fails if a target can not be found, empty bundles included: they place
/// nothing but still claim their anchor. Callers fall back to `base` in that case.
pub fn incorporate<T: BuilderTx>(
    base: &[T],
    bundles: &[Bundle<T>],
) -> Result<Vec<TxOrGen<T>>, IncorporateError> {
    let mut working: Vec<TxOrGen<T>> = base.iter().cloned().map(TxOrGen::Tx).collect();

    for bundle in bundles {
        let mut next = Vec::with_capacity(working.len() + bundle.len());
        let target = bundle.target_tx_hash;

        if target.is_zero() {
            next.extend(bundle.txs().iter().cloned());
            next.extend(working.into_iter().filter(|entry| !bundle.contains(&entry.id())));
        } else {
            let mut anchored = false;
            for entry in working {
                let id = entry.id();
                if bundle.contains(&id) {
                    continue;
                }
                next.push(entry);
                if id == target {
                    next.extend(bundle.txs().iter().cloned());
                    anchored = true;
                }
            }
            if !anchored {
                return Err(IncorporateError::FailedToIncorporateBundle { target });
            }
        }

        working = next;
    }

    Ok(working)
}
