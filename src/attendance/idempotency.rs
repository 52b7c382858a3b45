//! At-most-one persisted record per logical event.
//!
//! # Responsibilities
//! - Reserve an idempotency key by inserting its record atomically
//! - Convert a duplicate insert into the prior record, never an error
//!
//! # Design Decisions
//! - Atomicity is the store's: a check-then-insert without storage-level
//!   uniqueness cannot close the race between concurrent submissions and
//!   is deliberately not offered here

use std::sync::Arc;

use crate::attendance::model::AttendanceRecord;
use crate::attendance::store::{AttendanceStore, InsertOutcome, StoreError};

/// Outcome of a reservation attempt.
#[derive(Debug, Clone)]
pub enum Reservation {
    /// The key was unclaimed; this record is now stored.
    New(AttendanceRecord),
    /// The key was already claimed; the prior record is returned unchanged.
    Existing(AttendanceRecord),
}

/// Guards writes so retries of the same logical event have exactly one
/// effect.
pub struct IdempotencyGuard {
    store: Arc<dyn AttendanceStore>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    /// Atomically claim the record's idempotency key.
    ///
    /// A uniqueness collision is a normal outcome: the caller gets the
    /// record that won the race and treats the submission as a duplicate.
    pub async fn check_and_reserve(
        &self,
        record: AttendanceRecord,
    ) -> Result<Reservation, StoreError> {
        match self.store.insert_unique(record).await? {
            InsertOutcome::Inserted(stored) => Ok(Reservation::New(stored)),
            InsertOutcome::Duplicate(prior) => {
                tracing::debug!(
                    record_id = %prior.id,
                    idempotency_key = %prior.idempotency_key,
                    "Idempotency key already reserved"
                );
                Ok(Reservation::Existing(prior))
            }
        }
    }
}
