//! Bulkhead pools bounding concurrency per operation class.
//!
//! # Responsibilities
//! - Limit concurrent operations for one class (e.g. "validation")
//! - Hand out RAII permits that release on every exit path
//! - Track accepted/rejected counts for monitoring
//!
//! # Design Decisions
//! - Backed by a tokio semaphore; permits are owned so they can cross awaits
//! - Exhaustion either rejects immediately or waits a bounded time,
//!   per pool configuration
//! - Rejection is its own error type, distinct from circuit and validation
//!   failures, so callers can tell overload from unhealthiness

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::schema::BulkheadConfig;
use crate::observability::metrics;

/// Raised when a pool has no free slot within its admission policy.
#[derive(Debug, Clone, Error)]
#[error("bulkhead '{pool}' exhausted ({capacity} operations in flight)")]
pub struct BulkheadFullError {
    /// Pool that rejected the operation.
    pub pool: String,
    /// Configured capacity of the pool.
    pub capacity: usize,
}

/// How a pool behaves at capacity.
#[derive(Debug, Clone, Copy)]
enum AdmissionPolicy {
    /// Reject immediately.
    FailFast,
    /// Wait up to the given duration for a slot.
    Wait(Duration),
}

/// One slot in a bulkhead pool. Dropping the permit frees the slot, on
/// success, error, and timeout paths alike.
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

/// Point-in-time counters for one pool.
#[derive(Debug, Clone, Serialize)]
pub struct BulkheadStats {
    pub pool: String,
    pub capacity: usize,
    pub available: usize,
    pub in_flight: usize,
    pub total_accepted: u64,
    pub total_rejected: u64,
}

/// A bounded permit pool for one operation class.
pub struct Bulkhead {
    name: String,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    policy: AdmissionPolicy,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl Bulkhead {
    pub fn new(config: &BulkheadConfig) -> Self {
        let policy = if config.fail_fast {
            AdmissionPolicy::FailFast
        } else {
            AdmissionPolicy::Wait(Duration::from_millis(config.wait_timeout_ms))
        };
        Self {
            name: config.name.clone(),
            capacity: config.max_concurrent,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
            policy,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Pool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire one slot, applying the pool's admission policy.
    pub async fn acquire(&self) -> Result<BulkheadPermit, BulkheadFullError> {
        let acquired = match self.policy {
            AdmissionPolicy::FailFast => self.semaphore.clone().try_acquire_owned().ok(),
            AdmissionPolicy::Wait(limit) => {
                match tokio::time::timeout(limit, self.semaphore.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => Some(permit),
                    // The semaphore is never closed; a closed error means the
                    // pool is being torn down, treated as rejection.
                    Ok(Err(_)) | Err(_) => None,
                }
            }
        };

        match acquired {
            Some(permit) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                Ok(BulkheadPermit { _permit: permit })
            }
            None => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                metrics::record_bulkhead_rejection(&self.name);
                tracing::warn!(
                    pool = %self.name,
                    capacity = self.capacity,
                    "Bulkhead rejected operation"
                );
                Err(BulkheadFullError {
                    pool: self.name.clone(),
                    capacity: self.capacity,
                })
            }
        }
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Counters for the monitoring endpoint.
    pub fn stats(&self) -> BulkheadStats {
        let available = self.available();
        BulkheadStats {
            pool: self.name.clone(),
            capacity: self.capacity,
            available,
            in_flight: self.capacity - available,
            total_accepted: self.accepted.load(Ordering::Relaxed),
            total_rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(name: &str, capacity: usize, fail_fast: bool, wait_ms: u64) -> Bulkhead {
        Bulkhead::new(&BulkheadConfig {
            name: name.to_string(),
            max_concurrent: capacity,
            fail_fast,
            wait_timeout_ms: wait_ms,
        })
    }

    #[tokio::test]
    async fn fail_fast_rejects_at_capacity() {
        let bulkhead = pool("validation", 2, true, 0);

        let p1 = bulkhead.acquire().await.unwrap();
        let _p2 = bulkhead.acquire().await.unwrap();

        let err = bulkhead.acquire().await.unwrap_err();
        assert_eq!(err.pool, "validation");
        assert_eq!(err.capacity, 2);

        // Releasing a permit opens the pool again.
        drop(p1);
        assert!(bulkhead.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn waiting_pool_admits_when_slot_frees() {
        let bulkhead = Arc::new(pool("validation", 1, false, 500));

        let permit = bulkhead.acquire().await.unwrap();
        let waiter = {
            let bulkhead = bulkhead.clone();
            tokio::spawn(async move { bulkhead.acquire().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(permit);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn waiting_pool_rejects_after_wait_timeout() {
        let bulkhead = pool("validation", 1, false, 50);

        let _held = bulkhead.acquire().await.unwrap();
        let start = std::time::Instant::now();
        assert!(bulkhead.acquire().await.is_err());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn never_exceeds_capacity_under_contention() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let bulkhead = Arc::new(pool("validation", 4, false, 1_000));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let bulkhead = bulkhead.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = bulkhead.acquire().await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(bulkhead.available(), 4);
    }

    #[tokio::test]
    async fn permit_released_when_task_panics() {
        let bulkhead = Arc::new(pool("validation", 1, true, 0));

        let crashing = {
            let bulkhead = bulkhead.clone();
            tokio::spawn(async move {
                let _permit = bulkhead.acquire().await.unwrap();
                panic!("worker died");
            })
        };
        assert!(crashing.await.is_err());

        assert_eq!(bulkhead.available(), 1);
        assert!(bulkhead.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn stats_track_accept_and_reject() {
        let bulkhead = pool("validation", 1, true, 0);

        let _permit = bulkhead.acquire().await.unwrap();
        let _ = bulkhead.acquire().await;

        let stats = bulkhead.stats();
        assert_eq!(stats.total_accepted, 1);
        assert_eq!(stats.total_rejected, 1);
        assert_eq!(stats.in_flight, 1);
    }
}
