//! In-flight task accounting.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Thread-safe count of tasks currently executing on a worker.
///
/// Lock-free on the hot path; `wait_idle` lets shutdown wait for the count
/// to reach zero without polling.
#[derive(Debug, Default)]
pub struct InflightTracker {
    count: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicU64,
    idle: Notify,
}

impl InflightTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current in-flight count.
    #[must_use]
    pub fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Highest count observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Tasks that have entered since creation.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Count one task in; it is counted out when the guard drops.
    pub fn enter(self: &Arc<Self>) -> InflightGuard {
        let now = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::Relaxed);
        InflightGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Decrement, saturating at zero.
    ///
    /// # Returns
    /// - `true` if decremented
    /// - `false` if already at 0
    fn decrement(&self) -> bool {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if current == 1 {
                        self.idle.notify_waiters();
                    }
                    return true;
                }
                Err(_) => continue,
            }
        }
    }

    /// Resolve once nothing is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII registration of one in-flight task.
#[derive(Debug)]
pub struct InflightGuard {
    tracker: Arc<InflightTracker>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.tracker.decrement();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_enter_and_drop() {
        let tracker = Arc::new(InflightTracker::new());
        let a = tracker.enter();
        let b = tracker.enter();
        assert_eq!(tracker.current(), 2);
        drop(a);
        assert_eq!(tracker.current(), 1);
        drop(b);
        assert_eq!(tracker.current(), 0);
        assert_eq!(tracker.peak(), 2);
        assert_eq!(tracker.total(), 2);
    }

    #[test]
    fn test_decrement_saturates() {
        let tracker = InflightTracker::new();
        assert!(!tracker.decrement());
        assert_eq!(tracker.current(), 0);
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_empty() {
        let tracker = InflightTracker::new();
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_idle_wakes_on_last_exit() {
        let tracker = Arc::new(InflightTracker::new());
        let guard = tracker.enter();
        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
