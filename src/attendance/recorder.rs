//! Attendance recording orchestration.
//!
//! # Data Flow
//! ```text
//! record_attendance:
//!     acquire bulkhead permit ("validation" class)
//!     → validate student, then course (breaker + deadline per call)
//!     → reserve idempotency key / persist
//!     → enqueue "attendance_recorded" event (never blocks)
//! ```
//!
//! # Design Decisions
//! - A duplicate submission is a success with `duplicate = true`; callers
//!   may retry blindly on any retryable error
//! - An unreachable dependency rejects the write as retryable rather than
//!   accepting it optimistically
//! - The permit is held for the whole operation and released on every exit
//!   path by its drop guard

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::attendance::idempotency::{IdempotencyGuard, Reservation};
use crate::attendance::model::{AttendanceRecord, RecordRequest};
use crate::attendance::store::StoreError;
use crate::events::publisher::{AttendanceEvent, EventPublisher};
use crate::observability::metrics;
use crate::resilience::bulkhead::{Bulkhead, BulkheadFullError};
use crate::resilience::circuit_breaker::CircuitOpenError;
use crate::validation::validator::{ResourceKind, ServiceValidator, ValidationFailure};

/// Successful outcome of a record operation.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub record_id: Uuid,
    pub duplicate: bool,
}

/// Typed rejection of a record operation.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The request itself is malformed. Permanent.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// A referenced entity was confirmed absent by its owning service.
    /// Permanent.
    #[error("{kind} '{id}' does not exist")]
    EntityNotFound { kind: ResourceKind, id: String },

    /// A dependency's circuit is open; the call was not attempted.
    /// Retryable.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// A live attempt against a dependency failed. Retryable.
    #[error("dependency '{dependency}' unreachable")]
    DependencyUnreachable { dependency: &'static str },

    /// The operation-class pool is exhausted. Transient overload.
    #[error(transparent)]
    BulkheadFull(#[from] BulkheadFullError),

    /// Storage fault unrelated to uniqueness. Fatal to this request.
    #[error("attendance store failure: {0}")]
    Storage(#[from] StoreError),
}

impl RecordError {
    /// Whether a blind retry of the same request is safe and useful.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            RecordError::CircuitOpen(_)
                | RecordError::DependencyUnreachable { .. }
                | RecordError::BulkheadFull(_)
        )
    }

    fn from_validation(failure: ValidationFailure) -> Self {
        match failure {
            ValidationFailure::NotFound { kind, id } => RecordError::EntityNotFound { kind, id },
            ValidationFailure::CircuitOpen(e) => RecordError::CircuitOpen(e),
            ValidationFailure::Unreachable { dependency, .. } => {
                RecordError::DependencyUnreachable { dependency }
            }
        }
    }
}

/// One rejected entry of a bulk submission.
#[derive(Debug, Clone, Serialize)]
pub struct BulkRejection {
    pub index: usize,
    pub error: String,
    pub retryable: bool,
}

/// Outcome of a bulk submission.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BulkOutcome {
    pub recorded: usize,
    pub duplicates: usize,
    pub rejected: Vec<BulkRejection>,
}

/// Orchestrates validation, idempotency and persistence for attendance
/// writes. The only component the delivery layer talks to.
pub struct AttendanceRecorder {
    validator: ServiceValidator,
    guard: IdempotencyGuard,
    validation_pool: Arc<Bulkhead>,
    publisher: EventPublisher,
}

impl AttendanceRecorder {
    pub fn new(
        validator: ServiceValidator,
        guard: IdempotencyGuard,
        validation_pool: Arc<Bulkhead>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            validator,
            guard,
            validation_pool,
            publisher,
        }
    }

    /// Record one attendance event.
    ///
    /// Resubmitting the same `(student_id, course_id, date, session_name)`
    /// returns the original record with `duplicate = true`.
    pub async fn record_attendance(
        &self,
        request: RecordRequest,
    ) -> Result<RecordOutcome, RecordError> {
        ensure_well_formed(&request)?;

        let _permit = self.validation_pool.acquire().await?;

        self.validator
            .check(ResourceKind::Student, &request.student_id)
            .await
            .map_err(RecordError::from_validation)?;
        self.validator
            .check(ResourceKind::Course, &request.course_id)
            .await
            .map_err(RecordError::from_validation)?;

        if self.validator.enrollment_check_enabled() {
            let roster = self
                .validator
                .validate_enrollment(&request.student_id, &request.course_id)
                .await;
            if !roster.ok {
                return Err(RecordError::Invalid(format!(
                    "student '{}' is not enrolled in course '{}'",
                    request.student_id, request.course_id
                )));
            }
        }

        let record = AttendanceRecord::from_request(&request);
        match self.guard.check_and_reserve(record).await? {
            Reservation::New(stored) => {
                metrics::record_attendance_write(stored.status.as_str(), false);
                self.publisher.enqueue(AttendanceEvent::recorded(&stored));
                tracing::info!(
                    record_id = %stored.id,
                    student_id = %stored.student_id,
                    course_id = %stored.course_id,
                    date = %stored.date,
                    status = %stored.status,
                    "Attendance recorded"
                );
                Ok(RecordOutcome {
                    record_id: stored.id,
                    duplicate: false,
                })
            }
            Reservation::Existing(prior) => {
                metrics::record_attendance_write(prior.status.as_str(), true);
                tracing::info!(
                    record_id = %prior.id,
                    student_id = %prior.student_id,
                    course_id = %prior.course_id,
                    "Duplicate submission resolved to existing record"
                );
                Ok(RecordOutcome {
                    record_id: prior.id,
                    duplicate: true,
                })
            }
        }
    }

    /// Record many attendance events, independently per entry.
    ///
    /// Each entry goes through the full single-record path, so one bad or
    /// unreachable entry never poisons the rest of the batch.
    pub async fn record_bulk(&self, requests: Vec<RecordRequest>) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for (index, request) in requests.into_iter().enumerate() {
            match self.record_attendance(request).await {
                Ok(result) if result.duplicate => outcome.duplicates += 1,
                Ok(_) => outcome.recorded += 1,
                Err(e) => outcome.rejected.push(BulkRejection {
                    index,
                    retryable: e.retryable(),
                    error: e.to_string(),
                }),
            }
        }
        tracing::info!(
            recorded = outcome.recorded,
            duplicates = outcome.duplicates,
            rejected = outcome.rejected.len(),
            "Bulk attendance submission processed"
        );
        outcome
    }
}

fn ensure_well_formed(request: &RecordRequest) -> Result<(), RecordError> {
    if request.student_id.trim().is_empty() {
        return Err(RecordError::Invalid("student_id must not be empty".into()));
    }
    if request.course_id.trim().is_empty() {
        return Err(RecordError::Invalid("course_id must not be empty".into()));
    }
    if let Some(session) = &request.session_name {
        if session.trim().is_empty() {
            return Err(RecordError::Invalid(
                "session_name must not be blank when present".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::model::AttendanceStatus;

    fn request(student: &str, course: &str) -> RecordRequest {
        RecordRequest {
            student_id: student.to_string(),
            course_id: course.to_string(),
            date: "2024-01-15".parse().unwrap(),
            status: AttendanceStatus::Present,
            session_name: None,
        }
    }

    #[test]
    fn blank_identifiers_are_invalid() {
        assert!(ensure_well_formed(&request("", "CS101")).is_err());
        assert!(ensure_well_formed(&request("S001", "  ")).is_err());
        assert!(ensure_well_formed(&request("S001", "CS101")).is_ok());
    }

    #[test]
    fn retryability_follows_the_taxonomy() {
        let open = RecordError::CircuitOpen(CircuitOpenError {
            dependency: "course-service".to_string(),
            retry_in: std::time::Duration::from_secs(5),
        });
        assert!(open.retryable());

        let unreachable = RecordError::DependencyUnreachable {
            dependency: "student-service",
        };
        assert!(unreachable.retryable());

        let absent = RecordError::EntityNotFound {
            kind: ResourceKind::Student,
            id: "S999".to_string(),
        };
        assert!(!absent.retryable());

        assert!(!RecordError::Invalid("bad".into()).retryable());
    }
}
