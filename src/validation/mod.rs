//! Cross-service validation subsystem.
//!
//! # Data Flow
//! ```text
//! record_attendance(student_id, course_id, ...)
//!     → validator.rs
//!     → GET {student-service}/api/students/{id}   (breaker + deadline)
//!     → GET {course-service}/api/courses/{id}     (breaker + deadline)
//!     → ValidationResult / ValidationFailure
//! ```
//!
//! # Design Decisions
//! - No database foreign key spans service boundaries; existence is proven
//!   by calling the owning service's canonical resource endpoint
//! - 404 is a business answer from a healthy service, never a dependency
//!   fault — only unreachable outcomes feed the circuit breaker
//! - One validator, parameterized by a closed ResourceKind enum, instead of
//!   one ad-hoc validator type per entity

pub mod validator;

pub use validator::{
    CheckFailure, ResourceKind, ServiceValidator, ValidationFailure, ValidationReason,
    ValidationResult, COURSE_SERVICE, STUDENT_SERVICE,
};
