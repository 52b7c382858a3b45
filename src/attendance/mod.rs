//! Attendance recording subsystem.
//!
//! # Data Flow
//! ```text
//! record request
//!     → recorder.rs (orchestration: permit → validate → reserve → persist)
//!     → idempotency.rs (deterministic key, at-most-one record per key)
//!     → store.rs (atomic unique insert, queries, summaries)
//!     → events (outbound "attendance_recorded" notification)
//! ```
//!
//! # Design Decisions
//! - The idempotency key is derived from business identifiers, so retries
//!   triggered by any failure upstream converge on the same stored record
//! - Duplicate submissions are a success outcome, never an error
//! - Records are immutable once created

pub mod idempotency;
pub mod model;
pub mod recorder;
pub mod store;

pub use idempotency::{IdempotencyGuard, Reservation};
pub use model::{AttendanceRecord, AttendanceStatus, IdempotencyKey, RecordRequest};
pub use recorder::{AttendanceRecorder, BulkOutcome, RecordError, RecordOutcome};
pub use store::{AttendanceStore, InsertOutcome, MemoryStore, RecordFilter};
