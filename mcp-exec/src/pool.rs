//! Dispatch to a fixed pool of `W` worker slots behind a `2W` admission
//! semaphore: up to `2W` requests may be outstanding at once, but only `W`
//! are ever spawning or running a child at the same instant. Anything past
//! the admission bound is rejected immediately as [`AppError::Busy`]
//! instead of queueing indefinitely.

use std::sync::Arc;

use mcp_core::error::AppError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub struct ExecutionPool {
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
}

pub struct PoolPermit {
    _admission: OwnedSemaphorePermit,
    _worker: OwnedSemaphorePermit,
}

impl ExecutionPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            admission: Arc::new(Semaphore::new(workers * 2)),
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Fails fast with `Busy` if the admission bound is already saturated;
    /// otherwise waits for a free worker slot.
    pub async fn acquire(&self) -> Result<PoolPermit, AppError> {
        let admission = self
            .admission
            .clone()
            .try_acquire_owned()
            .map_err(|_| AppError::Busy)?;
        let worker = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("execution pool semaphore closed".to_string()))?;
        Ok(PoolPermit {
            _admission: admission,
            _worker: worker,
        })
    }

    pub fn outstanding(&self) -> usize {
        self.admission.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_once_admission_bound_is_saturated() {
        let pool = ExecutionPool::new(1);
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert!(matches!(pool.acquire().await, Err(AppError::Busy)));
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn a_held_permit_blocks_the_worker_slot_not_the_admission_slot() {
        let pool = ExecutionPool::new(1);
        let _first = pool.acquire().await.unwrap();
        // Second request is admitted (2W = 2) but would wait on the single
        // worker slot; confirm it does not immediately return Busy.
        let second = tokio::time::timeout(std::time::Duration::from_millis(50), pool.acquire()).await;
        assert!(second.is_err(), "second request should block on the worker slot, not fail");
    }
}
