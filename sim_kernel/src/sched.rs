//! Scheduler-suspended critical sections
//!
//! On the host there is no preemption control, so a single process-wide
//! lock stands in for "scheduler locked": no two critical sections ever
//! interleave.

use parking_lot::{const_mutex, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};

static SCHED_LOCK: Mutex<()> = const_mutex(());

/// Runs `f` with the scheduler locked
pub fn with_sched_locked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = SCHED_LOCK.lock();
    f()
}

/// Test-and-set of a busy flag inside a critical section.
///
/// Returns true if the flag was clear and is now owned by the caller.
pub fn try_acquire(flag: &AtomicBool) -> bool {
    with_sched_locked(|| {
        if flag.load(Ordering::Acquire) {
            return false;
        }
        flag.store(true, Ordering::Release);
        true
    })
}

/// Clears a busy flag acquired with [`try_acquire`]
pub fn release(flag: &AtomicBool) {
    flag.store(false, Ordering::Release);
}
