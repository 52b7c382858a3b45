//! Existence checks against the services that own referenced entities.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::schema::ServicesConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitError, CircuitOpenError};
use crate::resilience::registry::DependencyRegistry;
use crate::resilience::timeouts::TimeoutPolicy;

/// Dependency name of the student service.
pub const STUDENT_SERVICE: &str = "student-service";
/// Dependency name of the course service.
pub const COURSE_SERVICE: &str = "course-service";

/// The closed set of entity types validated across service boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Student,
    Course,
}

impl ResourceKind {
    /// Name of the dependency that owns this entity type.
    pub fn dependency(&self) -> &'static str {
        match self {
            ResourceKind::Student => STUDENT_SERVICE,
            ResourceKind::Course => COURSE_SERVICE,
        }
    }

    /// Canonical resource path on the owning service.
    fn resource_path(&self, id: &str) -> String {
        match self {
            ResourceKind::Student => format!("/api/students/{}", id),
            ResourceKind::Course => format!("/api/courses/{}", id),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Student => write!(f, "student"),
            ResourceKind::Course => write!(f, "course"),
        }
    }
}

/// Why a validation did not confirm existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    /// The owning service answered: no such entity.
    NotFound,
    /// The owning service could not give an answer.
    Unreachable,
}

/// Outcome of an existence check in wire-friendly form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub reason: Option<ValidationReason>,
}

impl ValidationResult {
    pub fn exists() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn not_found() -> Self {
        Self {
            ok: false,
            reason: Some(ValidationReason::NotFound),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            ok: false,
            reason: Some(ValidationReason::Unreachable),
        }
    }
}

impl From<&ValidationFailure> for ValidationResult {
    fn from(failure: &ValidationFailure) -> Self {
        match failure {
            ValidationFailure::NotFound { .. } => ValidationResult::not_found(),
            ValidationFailure::CircuitOpen(_) | ValidationFailure::Unreachable { .. } => {
                ValidationResult::unreachable()
            }
        }
    }
}

/// Low-level failure of a live check attempt. This is the breaker's inner
/// error type: every variant counts as a dependency fault.
#[derive(Debug, Error)]
pub enum CheckFailure {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Payload(String),

    #[error("request build failed: {0}")]
    Request(String),
}

/// Typed rejection of an existence check, preserving the precise failure
/// mode for callers and tests.
#[derive(Debug, Error)]
pub enum ValidationFailure {
    #[error("{kind} '{id}' does not exist")]
    NotFound { kind: ResourceKind, id: String },

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    #[error("dependency '{dependency}' unreachable: {cause}")]
    Unreachable {
        dependency: &'static str,
        cause: CheckFailure,
    },
}

enum Existence {
    Present,
    Absent,
}

#[derive(Deserialize)]
struct EnrollmentDoc {
    #[serde(default)]
    student_ids: Vec<String>,
}

/// Validates referenced entities by calling their owning services.
pub struct ServiceValidator {
    registry: Arc<DependencyRegistry>,
    client: Client<HttpConnector, Body>,
    student_base: String,
    course_base: String,
    check_timeout: Duration,
    check_enrollment: bool,
}

impl ServiceValidator {
    pub fn new(
        registry: Arc<DependencyRegistry>,
        config: &ServicesConfig,
        timeouts: TimeoutPolicy,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            registry,
            client,
            student_base: config.student_service_url.trim_end_matches('/').to_string(),
            course_base: config.course_service_url.trim_end_matches('/').to_string(),
            check_timeout: timeouts.validation,
            check_enrollment: config.check_enrollment,
        }
    }

    /// Whether the optional enrollment check is switched on.
    pub fn enrollment_check_enabled(&self) -> bool {
        self.check_enrollment
    }

    /// Prove `id` exists in the service owning `kind`.
    ///
    /// The breaker only sees unreachable outcomes as failures: a 404 comes
    /// back as `Ok(Existence::Absent)` inside the guarded call, so a flood
    /// of bad ids can never open the circuit.
    pub async fn check(&self, kind: ResourceKind, id: &str) -> Result<(), ValidationFailure> {
        let breaker = self.registry.breaker(kind.dependency());
        let url = format!("{}{}", self.base(kind), kind.resource_path(id));
        let client = self.client.clone();
        let deadline = self.check_timeout;

        let outcome = breaker
            .call(|| async move {
                let request = Request::builder()
                    .method("GET")
                    .uri(url.as_str())
                    .header("user-agent", "attendance-service/validator")
                    .body(Body::empty())
                    .map_err(|e| CheckFailure::Request(e.to_string()))?;

                match tokio::time::timeout(deadline, client.request(request)).await {
                    Ok(Ok(response)) => {
                        let status = response.status();
                        if status.is_success() {
                            Ok(Existence::Present)
                        } else if status == StatusCode::NOT_FOUND {
                            Ok(Existence::Absent)
                        } else {
                            Err(CheckFailure::Status(status.as_u16()))
                        }
                    }
                    Ok(Err(e)) => Err(CheckFailure::Connect(e.to_string())),
                    Err(_) => Err(CheckFailure::Timeout(deadline)),
                }
            })
            .await;

        match outcome {
            Ok(Existence::Present) => {
                metrics::record_validation_check(kind.dependency(), "exists");
                Ok(())
            }
            Ok(Existence::Absent) => {
                metrics::record_validation_check(kind.dependency(), "not_found");
                tracing::debug!(%kind, id, "Referenced entity does not exist");
                Err(ValidationFailure::NotFound {
                    kind,
                    id: id.to_string(),
                })
            }
            Err(CircuitError::Open(e)) => {
                metrics::record_validation_check(kind.dependency(), "circuit_open");
                tracing::warn!(dependency = kind.dependency(), "Validation rejected, circuit open");
                Err(ValidationFailure::CircuitOpen(e))
            }
            Err(CircuitError::Inner(cause)) => {
                metrics::record_validation_check(kind.dependency(), "unreachable");
                tracing::warn!(
                    dependency = kind.dependency(),
                    error = %cause,
                    "Validation call failed"
                );
                Err(ValidationFailure::Unreachable {
                    dependency: kind.dependency(),
                    cause,
                })
            }
        }
    }

    /// Confirm a student exists in the student service.
    pub async fn validate_student_exists(&self, student_id: &str) -> ValidationResult {
        match self.check(ResourceKind::Student, student_id).await {
            Ok(()) => ValidationResult::exists(),
            Err(failure) => (&failure).into(),
        }
    }

    /// Confirm a course exists in the course service.
    pub async fn validate_course_exists(&self, course_id: &str) -> ValidationResult {
        match self.check(ResourceKind::Course, course_id).await {
            Ok(()) => ValidationResult::exists(),
            Err(failure) => (&failure).into(),
        }
    }

    /// Validate both referenced entities, student first. The first failed
    /// check decides the result.
    pub async fn validate(&self, student_id: &str, course_id: &str) -> ValidationResult {
        if let Err(failure) = self.check(ResourceKind::Student, student_id).await {
            return (&failure).into();
        }
        if let Err(failure) = self.check(ResourceKind::Course, course_id).await {
            return (&failure).into();
        }
        ValidationResult::exists()
    }

    /// Check the student appears on the course roster.
    ///
    /// Enrollment is advisory: when the roster cannot be fetched the write
    /// is accepted with a warning instead of being rejected.
    pub async fn validate_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> ValidationResult {
        let breaker = self.registry.breaker(COURSE_SERVICE);
        let url = format!("{}/api/courses/{}/students", self.course_base, course_id);
        let client = self.client.clone();
        let deadline = self.check_timeout;
        let student = student_id.to_string();

        let outcome = breaker
            .call(|| async move {
                let request = Request::builder()
                    .method("GET")
                    .uri(url.as_str())
                    .header("user-agent", "attendance-service/validator")
                    .body(Body::empty())
                    .map_err(|e| CheckFailure::Request(e.to_string()))?;

                match tokio::time::timeout(deadline, client.request(request)).await {
                    Ok(Ok(response)) if response.status().is_success() => {
                        let body = axum::body::to_bytes(Body::new(response.into_body()), 1024 * 1024)
                            .await
                            .map_err(|e| CheckFailure::Payload(e.to_string()))?;
                        let roster: EnrollmentDoc = serde_json::from_slice(&body)
                            .map_err(|e| CheckFailure::Payload(e.to_string()))?;
                        Ok(roster.student_ids.contains(&student))
                    }
                    Ok(Ok(response)) => Err(CheckFailure::Status(response.status().as_u16())),
                    Ok(Err(e)) => Err(CheckFailure::Connect(e.to_string())),
                    Err(_) => Err(CheckFailure::Timeout(deadline)),
                }
            })
            .await;

        match outcome {
            Ok(true) => ValidationResult::exists(),
            Ok(false) => {
                tracing::debug!(student_id, course_id, "Student not on course roster");
                ValidationResult::not_found()
            }
            Err(e) => {
                tracing::warn!(
                    course_id,
                    error = %e,
                    "Enrollment check skipped, roster unavailable"
                );
                ValidationResult::exists()
            }
        }
    }

    fn base(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Student => &self.student_base,
            ResourceKind::Course => &self.course_base,
        }
    }
}
