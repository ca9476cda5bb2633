use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock the query table, recovering the guard if a previous holder panicked.
///
/// Entries are replaced wholesale and never mutated in place, so a poisoned
/// table is still structurally sound.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}
