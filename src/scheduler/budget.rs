use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("requested {requested} jobs but the budget caps at {capacity}")]
    Oversized { requested: usize, capacity: usize },

    #[error("concurrency budget closed")]
    Closed,
}

/// The per-campaign cap on concurrently outstanding platform jobs.
///
/// Submit and complete form one accounting transaction: permits are acquired
/// before a batch is dispatched and released only when its results have been
/// retrieved, so the platform can never be over-subscribed between the two.
#[derive(Debug, Clone)]
pub struct ConcurrencyBudget {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyBudget {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Acquire permits for `jobs` platform jobs, waiting until earlier
    /// batches have freed enough capacity. The returned permit releases the
    /// capacity when dropped.
    pub async fn acquire_jobs(&self, jobs: usize) -> Result<OwnedSemaphorePermit, BudgetError> {
        if jobs > self.capacity {
            return Err(BudgetError::Oversized {
                requested: jobs,
                capacity: self.capacity,
            });
        }

        self.semaphore
            .clone()
            .acquire_many_owned(jobs as u32)
            .await
            .map_err(|_| BudgetError::Closed)
    }
}
