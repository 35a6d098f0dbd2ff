//! Level-triggered "metadata is stale" signal.
//!
//! Any number of `set` calls between two `take`s collapse into one pending
//! state. The signal remembers when it was first and last set so the
//! regenerator can wait out a quiet period after a burst.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Result of waiting on an [`UpdateSignal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The signal is pending
    Pending,
    /// The wait timed out with nothing pending
    Timeout,
    /// Shutdown was requested
    Shutdown,
}

#[derive(Debug, Default)]
struct SignalState {
    /// When the current pending burst started, if any
    first_set: Option<Instant>,
    /// Most recent set in the current burst
    last_set: Option<Instant>,
    shutdown: bool,
}

/// Shared pending-metadata-update flag
#[derive(Debug, Default)]
pub struct UpdateSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl UpdateSignal {
    /// Create a cleared signal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark metadata as stale
    pub fn set(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.first_set.get_or_insert(now);
        state.last_set = Some(now);
        self.cond.notify_all();
    }

    /// Whether the signal is currently pending
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.state.lock().last_set.is_some()
    }

    /// Clear the signal, returning whether it was pending
    pub fn take(&self) -> bool {
        let mut state = self.state.lock();
        state.first_set = None;
        state.last_set.take().is_some()
    }

    /// Block until the signal is pending, shutdown is requested, or `timeout` elapses
    pub fn wait(&self, timeout: Duration) -> Wake {
        let mut state = self.state.lock();
        if state.shutdown {
            return Wake::Shutdown;
        }
        if state.last_set.is_none() {
            self.cond.wait_for(&mut state, timeout);
        }

        if state.shutdown {
            Wake::Shutdown
        } else if state.last_set.is_some() {
            Wake::Pending
        } else {
            Wake::Timeout
        }
    }

    /// Wait until no `set` has happened for `quiet`, or until `max_delay` has
    /// passed since the burst began. Returns early on shutdown.
    pub fn settle(&self, quiet: Duration, max_delay: Duration) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return Wake::Shutdown;
            }
            let (Some(first), Some(last)) = (state.first_set, state.last_set) else {
                return Wake::Timeout;
            };

            let quiet_deadline = last + quiet;
            let hard_deadline = first + max_delay;
            let deadline = quiet_deadline.min(hard_deadline);
            if Instant::now() >= deadline {
                return Wake::Pending;
            }
            // Woken early by further sets or shutdown; recompute deadlines
            self.cond.wait_until(&mut state, deadline);
        }
    }

    /// Request shutdown and wake every waiter
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sets_coalesce() {
        let signal = UpdateSignal::new();
        for _ in 0..10 {
            signal.set();
        }
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_wait_times_out_when_clear() {
        let signal = UpdateSignal::new();
        assert_eq!(signal.wait(Duration::from_millis(10)), Wake::Timeout);
    }

    #[test]
    fn test_wait_returns_immediately_when_pending() {
        let signal = UpdateSignal::new();
        signal.set();
        assert_eq!(signal.wait(Duration::from_secs(10)), Wake::Pending);
    }

    #[test]
    fn test_wait_wakes_on_set_from_other_thread() {
        let signal = Arc::new(UpdateSignal::new());
        let setter = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        assert_eq!(signal.wait(Duration::from_secs(5)), Wake::Pending);
        handle.join().unwrap();
    }

    #[test]
    fn test_settle_waits_for_quiet_period() {
        let signal = UpdateSignal::new();
        signal.set();
        let start = Instant::now();

        assert_eq!(
            signal.settle(Duration::from_millis(50), Duration::from_secs(5)),
            Wake::Pending
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_settle_is_capped_by_max_delay() {
        let signal = Arc::new(UpdateSignal::new());
        signal.set();
        let start = Instant::now();

        let setter = Arc::clone(&signal);
        let churn = thread::spawn(move || {
            for _ in 0..40 {
                setter.set();
                thread::sleep(Duration::from_millis(10));
            }
        });

        assert_eq!(
            signal.settle(Duration::from_millis(100), Duration::from_millis(150)),
            Wake::Pending
        );
        assert!(start.elapsed() < Duration::from_millis(350));
        churn.join().unwrap();
    }

    #[test]
    fn test_shutdown_wakes_waiter() {
        let signal = Arc::new(UpdateSignal::new());
        let stopper = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stopper.shutdown();
        });

        assert_eq!(signal.wait(Duration::from_secs(5)), Wake::Shutdown);
        assert_eq!(signal.wait(Duration::ZERO), Wake::Shutdown);
        handle.join().unwrap();
    }
}
