// src/core/signal.rs
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::lock::lock_mutex;

/// Latching wake-up flag shared between a controlling thread and a waiter.
///
/// `set` stores the flag before notifying, so a waiter that checks the flag
/// after being woken never goes back to sleep on a stale value.
#[derive(Debug, Default)]
pub struct Signal {
    flag: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        let mut flag = lock_mutex(&self.flag, "signal.set");
        *flag = true;
        self.cond.notify_all();
    }

    pub fn clear(&self) {
        *lock_mutex(&self.flag, "signal.clear") = false;
    }

    pub fn is_set(&self) -> bool {
        *lock_mutex(&self.flag, "signal.is_set")
    }

    /// Blocks for at most `timeout`. Returns `true` if the signal was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let flag = lock_mutex(&self.flag, "signal.wait");
        match self.cond.wait_timeout_while(flag, timeout, |set| !*set) {
            Ok((flag, _)) => *flag,
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_when_unset() {
        let signal = Signal::new();
        let started = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_set_wakes_waiter_early() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || signal.wait_timeout(Duration::from_secs(10)))
        };

        std::thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        signal.set();

        assert!(waiter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_set_is_latched_until_cleared() {
        let signal = Signal::new();
        signal.set();
        assert!(signal.is_set());
        assert!(signal.wait_timeout(Duration::ZERO));

        signal.clear();
        assert!(!signal.is_set());
    }
}
