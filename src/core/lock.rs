// src/core/lock.rs
use std::sync::{Mutex, MutexGuard};

/// Locks `mutex`, recovering the guard if a panicking thread poisoned it.
///
/// The supervisor and monitor threads must keep working after a panic in a
/// line observer, so poisoning is logged instead of propagated.
pub fn lock_mutex<'a, T: ?Sized>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::error!("Mutex lock poisoned in {}", context);
            poisoned.into_inner()
        }
    }
}
