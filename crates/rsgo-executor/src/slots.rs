//! Worker slots.
//!
//! A slot is a permit on a semaphore plus a stable worker id. Growing the
//! pool adds permits immediately; shrinking retires free slots at once and
//! the rest as their current task finishes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

#[derive(Debug)]
pub struct WorkerSlots {
    permits: Arc<Semaphore>,
    free_ids: Mutex<Vec<usize>>,
    next_id: AtomicUsize,
    size: AtomicUsize,
    /// Busy slots to drop instead of returning.
    retire: AtomicUsize,
}

impl WorkerSlots {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size)),
            free_ids: Mutex::new((0..size).rev().collect()),
            next_id: AtomicUsize::new(size),
            size: AtomicUsize::new(size),
            retire: AtomicUsize::new(0),
        }
    }

    /// Configured number of slots.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Slots free right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot. Fails once the slots are closed.
    pub async fn acquire(self: &Arc<Self>) -> Result<WorkerLease, AcquireError> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        let id = self
            .free_ids
            .lock()
            .pop()
            .unwrap_or_else(|| self.next_id.fetch_add(1, Ordering::AcqRel));
        Ok(WorkerLease {
            slots: Arc::clone(self),
            permit: Some(permit),
            id,
        })
    }

    /// Change the number of slots.
    pub fn resize(&self, target: usize) {
        let current = self.size.swap(target, Ordering::AcqRel);
        if target > current {
            let mut grow = target - current;
            // Cancel pending retirements before adding fresh permits.
            while grow > 0 {
                let debt = self.retire.load(Ordering::Acquire);
                if debt == 0 {
                    break;
                }
                let take = debt.min(grow);
                if self
                    .retire
                    .compare_exchange(debt, debt - take, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    grow -= take;
                }
            }
            self.permits.add_permits(grow);
        } else if target < current {
            let mut shrink = current - target;
            while shrink > 0 {
                match Arc::clone(&self.permits).try_acquire_owned() {
                    Ok(permit) => {
                        permit.forget();
                        self.free_ids.lock().pop();
                        shrink -= 1;
                    }
                    Err(_) => break,
                }
            }
            if shrink > 0 {
                self.retire.fetch_add(shrink, Ordering::AcqRel);
            }
        }
        debug!(from = current, to = target, "Worker slots resized");
    }

    /// Refuse further acquisitions; waiters fail immediately.
    pub fn close(&self) {
        self.permits.close();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    fn try_retire(&self) -> bool {
        loop {
            let debt = self.retire.load(Ordering::Acquire);
            if debt == 0 {
                return false;
            }
            if self
                .retire
                .compare_exchange_weak(debt, debt - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// Exclusive use of one worker slot; returned (or retired) on drop.
#[derive(Debug)]
pub struct WorkerLease {
    slots: Arc<WorkerSlots>,
    permit: Option<OwnedSemaphorePermit>,
    id: usize,
}

impl WorkerLease {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        if self.slots.try_retire() {
            permit.forget();
            debug!(worker_id = self.id, "Worker slot retired");
        } else {
            self.slots.free_ids.lock().push(self.id);
            drop(permit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_unique_while_leased() {
        let slots = Arc::new(WorkerSlots::new(3));
        let a = slots.acquire().await.unwrap();
        let b = slots.acquire().await.unwrap();
        let c = slots.acquire().await.unwrap();
        let mut ids = vec![a.id(), b.id(), c.id()];
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(slots.available(), 0);
        drop(b);
        assert_eq!(slots.available(), 1);
        let d = slots.acquire().await.unwrap();
        assert_eq!(d.id(), 1);
    }

    #[tokio::test]
    async fn test_grow_adds_capacity() {
        let slots = Arc::new(WorkerSlots::new(1));
        let _a = slots.acquire().await.unwrap();
        slots.resize(2);
        assert_eq!(slots.size(), 2);
        assert_eq!(slots.available(), 1);
    }

    #[tokio::test]
    async fn test_shrink_retires_busy_slots_on_release() {
        let slots = Arc::new(WorkerSlots::new(3));
        let a = slots.acquire().await.unwrap();
        let b = slots.acquire().await.unwrap();
        slots.resize(1);
        // The free slot goes at once, one busy slot still owes retirement.
        assert_eq!(slots.available(), 0);
        drop(a);
        assert_eq!(slots.available(), 0);
        drop(b);
        assert_eq!(slots.available(), 1);
    }

    #[tokio::test]
    async fn test_grow_cancels_pending_retirement() {
        let slots = Arc::new(WorkerSlots::new(2));
        let a = slots.acquire().await.unwrap();
        let b = slots.acquire().await.unwrap();
        slots.resize(1);
        slots.resize(2);
        drop(a);
        drop(b);
        assert_eq!(slots.available(), 2);
    }

    #[tokio::test]
    async fn test_close_fails_waiters() {
        let slots = Arc::new(WorkerSlots::new(1));
        let _held = slots.acquire().await.unwrap();
        slots.close();
        assert!(slots.acquire().await.is_err());
        assert!(slots.is_closed());
    }
}
