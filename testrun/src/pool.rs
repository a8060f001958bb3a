use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::error::PoolError;
use crate::run::WorkerId;

/// Point-in-time view of the pool, for diagnostics and tests.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Workers ready to take an attempt, in acquisition order.
    pub available: Vec<WorkerId>,
    /// Workers currently held by an attempt.
    pub checked_out: Vec<WorkerId>,
}

impl PoolSnapshot {
    /// Total number of workers the snapshot accounts for.
    pub fn total(&self) -> usize {
        self.available.len() + self.checked_out.len()
    }
}

#[derive(Debug)]
struct PoolState {
    available: VecDeque<WorkerId>,
    checked_out: HashSet<WorkerId>,
}

/// Fixed set of named workers with non-blocking checkout.
///
/// Every worker is either available or checked out, never both and never
/// neither. Acquisition never waits: when every worker is out,
/// [`WorkerPool::try_acquire`] returns `None` immediately.
pub struct WorkerPool {
    members: HashSet<WorkerId>,
    state: Mutex<PoolState>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("WorkerPool");
        debug.field("size", &self.members.len());

        match self.state.try_lock() {
            Some(state) => {
                debug.field("available", &state.available.len());
                debug.field("checked_out", &state.checked_out.len());
            }
            None => {
                debug.field("state", &"<locked>");
            }
        }

        debug.finish()
    }
}

impl WorkerPool {
    /// Create a pool where every worker starts available.
    pub fn new<I, W>(workers: I) -> Result<Self, PoolError>
    where
        I: IntoIterator<Item = W>,
        W: Into<WorkerId>,
    {
        let mut members = HashSet::new();
        let mut available = VecDeque::new();

        for worker in workers {
            let worker = worker.into();
            if !members.insert(worker.clone()) {
                return Err(PoolError::Duplicate(worker));
            }
            available.push_back(worker);
        }

        if members.is_empty() {
            return Err(PoolError::Empty);
        }

        Ok(Self {
            members,
            state: Mutex::new(PoolState {
                available,
                checked_out: HashSet::new(),
            }),
        })
    }

    /// Check out the longest-idle worker, or `None` if all are busy.
    pub fn try_acquire(&self) -> Option<WorkerId> {
        let mut state = self.state.lock();
        let worker = state.available.pop_front()?;
        state.checked_out.insert(worker.clone());
        Some(worker)
    }

    /// Return a checked-out worker to the pool.
    pub fn release(&self, worker: WorkerId) -> Result<(), PoolError> {
        if !self.members.contains(&worker) {
            return Err(PoolError::UnknownWorker(worker));
        }

        let mut state = self.state.lock();
        if !state.checked_out.remove(&worker) {
            return Err(PoolError::NotCheckedOut(worker));
        }
        state.available.push_back(worker);
        Ok(())
    }

    /// Configured number of workers.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Number of workers ready to be acquired.
    pub fn available_count(&self) -> usize {
        self.state.lock().available.len()
    }

    /// Number of workers held by in-flight attempts.
    pub fn checked_out_count(&self) -> usize {
        self.state.lock().checked_out.len()
    }

    /// Consistent view of both sets, taken under one lock.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        let mut checked_out: Vec<WorkerId> =
            state.checked_out.iter().cloned().collect();
        checked_out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        PoolSnapshot {
            available: state.available.iter().cloned().collect(),
            checked_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_pool_enforces_fixed_capacity() {
        let pool = WorkerPool::new(["worker1", "worker2"]).unwrap();

        let w1 = pool.try_acquire().unwrap();
        let w2 = pool.try_acquire().unwrap();
        assert_ne!(w1, w2);
        assert!(pool.try_acquire().is_none(), "pool should be exhausted");
        assert_eq!(pool.checked_out_count(), 2);

        pool.release(w1.clone()).unwrap();
        assert_eq!(pool.try_acquire(), Some(w1));

        pool.release(w2).unwrap();
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_acquire_order_is_fifo() {
        let pool = WorkerPool::new(["worker1", "worker2", "worker3"]).unwrap();
        assert_eq!(pool.try_acquire(), Some(WorkerId::new("worker1")));
        assert_eq!(pool.try_acquire(), Some(WorkerId::new("worker2")));
        pool.release(WorkerId::new("worker1")).unwrap();
        assert_eq!(pool.try_acquire(), Some(WorkerId::new("worker3")));
        assert_eq!(pool.try_acquire(), Some(WorkerId::new("worker1")));
    }

    #[test]
    fn test_rejects_invalid_release() {
        let pool = WorkerPool::new(["worker1"]).unwrap();

        let err = pool.release(WorkerId::new("worker1")).unwrap_err();
        assert_eq!(err, PoolError::NotCheckedOut(WorkerId::new("worker1")));

        let err = pool.release(WorkerId::new("ghost")).unwrap_err();
        assert_eq!(err, PoolError::UnknownWorker(WorkerId::new("ghost")));

        // Neither failed release may duplicate a worker.
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.snapshot().total(), 1);
    }

    #[test]
    fn test_rejects_empty_and_duplicate_members() {
        let empty: Vec<&str> = Vec::new();
        assert_eq!(WorkerPool::new(empty).unwrap_err(), PoolError::Empty);
        assert_eq!(
            WorkerPool::new(["a", "b", "a"]).unwrap_err(),
            PoolError::Duplicate(WorkerId::new("a"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_release_preserves_size() {
        let pool = Arc::new(
            WorkerPool::new(["worker1", "worker2", "worker3"]).unwrap(),
        );

        let mut handles = Vec::new();
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                for _ in 0..500 {
                    if let Some(worker) = pool.try_acquire() {
                        let snapshot = pool.snapshot();
                        assert_eq!(snapshot.total(), 3);
                        assert!(snapshot.checked_out.contains(&worker));
                        tokio::task::yield_now().await;
                        pool.release(worker).unwrap();
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.available.len(), 3);
        assert!(snapshot.checked_out.is_empty());
    }
}
