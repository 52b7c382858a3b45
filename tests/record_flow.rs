//! End-to-end record flow tests against mock peer services.

use std::net::SocketAddr;
use std::time::Duration;

use attendance_service::attendance::model::{AttendanceStatus, RecordRequest};
use attendance_service::attendance::recorder::RecordError;
use attendance_service::attendance::store::AttendanceStore;
use attendance_service::config::schema::ResilienceConfig;

mod common;

fn request(student: &str, course: &str, date: &str, session: &str) -> RecordRequest {
    RecordRequest {
        student_id: student.to_string(),
        course_id: course.to_string(),
        date: date.parse().unwrap(),
        status: AttendanceStatus::Present,
        session_name: Some(session.to_string()),
    }
}

#[tokio::test]
async fn duplicate_submission_returns_original_record() {
    let student_addr: SocketAddr = "127.0.0.1:28311".parse().unwrap();
    let course_addr: SocketAddr = "127.0.0.1:28312".parse().unwrap();
    common::start_entity_service(student_addr, &["S001"]).await;
    common::start_entity_service(course_addr, &["CS101"]).await;

    let harness = common::harness(
        &format!("http://{}", student_addr),
        &format!("http://{}", course_addr),
        ResilienceConfig::default(),
    );

    let first = harness
        .recorder
        .record_attendance(request("S001", "CS101", "2024-01-15", "Lecture1"))
        .await
        .unwrap();
    assert!(!first.duplicate);

    let second = harness
        .recorder
        .record_attendance(request("S001", "CS101", "2024-01-15", "Lecture1"))
        .await
        .unwrap();
    assert!(second.duplicate);
    assert_eq!(second.record_id, first.record_id);

    assert_eq!(harness.store.count().await.unwrap(), 1);

    // Exactly one domain event for the one persisted record.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let events = harness.sink.delivered.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "attendance_recorded");
    assert_eq!(events[0].student_id, "S001");
}

#[tokio::test]
async fn unknown_student_is_a_permanent_rejection() {
    let student_addr: SocketAddr = "127.0.0.1:28313".parse().unwrap();
    let course_addr: SocketAddr = "127.0.0.1:28314".parse().unwrap();
    common::start_entity_service(student_addr, &["S001"]).await;
    common::start_entity_service(course_addr, &["CS101"]).await;

    let harness = common::harness(
        &format!("http://{}", student_addr),
        &format!("http://{}", course_addr),
        ResilienceConfig::default(),
    );

    let error = harness
        .recorder
        .record_attendance(request("S999", "CS101", "2024-01-15", "Lecture1"))
        .await
        .unwrap_err();

    assert!(matches!(error, RecordError::EntityNotFound { .. }));
    assert!(!error.retryable());
    assert_eq!(harness.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn unreachable_course_service_rejects_as_retryable() {
    let student_addr: SocketAddr = "127.0.0.1:28315".parse().unwrap();
    common::start_entity_service(student_addr, &["S001"]).await;

    // Nothing listens on the course port.
    let harness = common::harness(
        &format!("http://{}", student_addr),
        "http://127.0.0.1:29998",
        ResilienceConfig::default(),
    );

    let error = harness
        .recorder
        .record_attendance(request("S001", "CS101", "2024-01-15", "Lecture1"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        RecordError::DependencyUnreachable {
            dependency: "course-service"
        }
    ));
    assert!(error.retryable());
    assert_eq!(harness.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_submissions_converge_on_one_record() {
    let student_addr: SocketAddr = "127.0.0.1:28316".parse().unwrap();
    let course_addr: SocketAddr = "127.0.0.1:28317".parse().unwrap();
    common::start_entity_service(student_addr, &["S001"]).await;
    common::start_entity_service(course_addr, &["CS101"]).await;

    let harness = common::harness(
        &format!("http://{}", student_addr),
        &format!("http://{}", course_addr),
        ResilienceConfig::default(),
    );

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let recorder = harness.recorder.clone();
        tasks.push(tokio::spawn(async move {
            recorder
                .record_attendance(request("S001", "CS101", "2024-01-15", "Lecture1"))
                .await
                .unwrap()
        }));
    }

    let mut new_records = 0;
    let mut record_ids = std::collections::HashSet::new();
    for task in tasks {
        let outcome = task.await.unwrap();
        if !outcome.duplicate {
            new_records += 1;
        }
        record_ids.insert(outcome.record_id);
    }

    assert_eq!(new_records, 1);
    assert_eq!(record_ids.len(), 1);
    assert_eq!(harness.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn bulk_submission_isolates_bad_entries() {
    let student_addr: SocketAddr = "127.0.0.1:28318".parse().unwrap();
    let course_addr: SocketAddr = "127.0.0.1:28319".parse().unwrap();
    common::start_entity_service(student_addr, &["S001", "S002"]).await;
    common::start_entity_service(course_addr, &["CS101"]).await;

    let harness = common::harness(
        &format!("http://{}", student_addr),
        &format!("http://{}", course_addr),
        ResilienceConfig::default(),
    );

    let outcome = harness
        .recorder
        .record_bulk(vec![
            request("S001", "CS101", "2024-01-15", "Lecture1"),
            request("S002", "CS101", "2024-01-15", "Lecture1"),
            request("S404", "CS101", "2024-01-15", "Lecture1"),
            // Duplicate of the first entry.
            request("S001", "CS101", "2024-01-15", "Lecture1"),
        ])
        .await;

    assert_eq!(outcome.recorded, 2);
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].index, 2);
    assert!(!outcome.rejected[0].retryable);
    assert_eq!(harness.store.count().await.unwrap(), 2);
}
