//! Enrollment roster checks against the course service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use attendance_service::config::schema::{ResilienceConfig, ServicesConfig};
use attendance_service::resilience::registry::DependencyRegistry;
use attendance_service::resilience::timeouts::TimeoutPolicy;
use attendance_service::validation::validator::{ServiceValidator, ValidationReason};

mod common;

fn validator(course_url: &str) -> (ServiceValidator, Arc<DependencyRegistry>) {
    let registry = Arc::new(DependencyRegistry::new(&ResilienceConfig::default()));
    let services = ServicesConfig {
        student_service_url: "http://127.0.0.1:29994".to_string(),
        course_service_url: course_url.to_string(),
        check_timeout_secs: 1,
        check_enrollment: true,
    };
    let timeouts = TimeoutPolicy {
        validation: Duration::from_secs(1),
        request: Duration::from_secs(10),
    };
    (
        ServiceValidator::new(registry.clone(), &services, timeouts),
        registry,
    )
}

#[tokio::test]
async fn roster_membership_decides_enrollment() {
    let course_addr: SocketAddr = "127.0.0.1:28351".parse().unwrap();
    common::start_mock_service(course_addr, |path| async move {
        if path == "/api/courses/CS101/students" {
            (200, "{\"student_ids\":[\"S001\",\"S002\"]}".to_string())
        } else {
            (404, "{\"error\":\"not found\"}".to_string())
        }
    })
    .await;

    let (validator, _registry) = validator(&format!("http://{}", course_addr));

    let enrolled = validator.validate_enrollment("S001", "CS101").await;
    assert!(enrolled.ok);

    let stranger = validator.validate_enrollment("S777", "CS101").await;
    assert!(!stranger.ok);
    assert_eq!(stranger.reason, Some(ValidationReason::NotFound));
}

#[tokio::test]
async fn unreachable_roster_is_lenient() {
    // Nothing listens on the course port: the advisory check lets the
    // write proceed rather than blocking attendance on a roster lookup.
    let (validator, registry) = validator("http://127.0.0.1:29993");

    let outcome = validator.validate_enrollment("S001", "CS101").await;
    assert!(outcome.ok);

    // The failed roster call still counts against the course service.
    let status = registry.circuit_status("course-service").unwrap();
    assert_eq!(status.failure_count, 1);
}
