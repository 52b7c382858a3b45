//! Attendance domain types and idempotency key derivation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Attendance status for one student in one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("invalid attendance status '{0}', expected present|absent|late|excused")]
pub struct InvalidStatus(pub String);

impl std::str::FromStr for AttendanceStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Deterministic fingerprint of one logical attendance event.
///
/// Same `(student_id, course_id, date, session_name)` always hashes to the
/// same key; the status is deliberately excluded so a retried submission
/// with a corrected status still resolves to the original record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn derive(
        student_id: &str,
        course_id: &str,
        date: NaiveDate,
        session_name: Option<&str>,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(student_id.as_bytes());
        hasher.update(b":");
        hasher.update(course_id.as_bytes());
        hasher.update(b":");
        hasher.update(date.format("%Y-%m-%d").to_string().as_bytes());
        hasher.update(b":");
        hasher.update(session_name.unwrap_or("").as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inbound request to record attendance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordRequest {
    pub student_id: String,
    pub course_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub session_name: Option<String>,
}

impl RecordRequest {
    /// The idempotency key this request resolves to.
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::derive(
            &self.student_id,
            &self.course_id,
            self.date,
            self.session_name.as_deref(),
        )
    }
}

/// One persisted attendance record. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: String,
    pub course_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub session_name: Option<String>,
    pub status: AttendanceStatus,
    pub idempotency_key: IdempotencyKey,
    pub recorded_at: DateTime<Utc>,
}

impl AttendanceRecord {
    /// Materialize a request into a record ready for insertion.
    pub fn from_request(request: &RecordRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: request.student_id.clone(),
            course_id: request.course_id.clone(),
            date: request.date,
            session_name: request.session_name.clone(),
            status: request.status,
            idempotency_key: request.idempotency_key(),
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn identical_inputs_derive_identical_keys() {
        let a = IdempotencyKey::derive("S001", "CS101", date("2024-01-15"), Some("Lecture1"));
        let b = IdempotencyKey::derive("S001", "CS101", date("2024-01-15"), Some("Lecture1"));
        assert_eq!(a, b);
    }

    #[test]
    fn any_differing_input_changes_the_key() {
        let base = IdempotencyKey::derive("S001", "CS101", date("2024-01-15"), Some("Lecture1"));

        assert_ne!(
            base,
            IdempotencyKey::derive("S002", "CS101", date("2024-01-15"), Some("Lecture1"))
        );
        assert_ne!(
            base,
            IdempotencyKey::derive("S001", "CS102", date("2024-01-15"), Some("Lecture1"))
        );
        assert_ne!(
            base,
            IdempotencyKey::derive("S001", "CS101", date("2024-01-16"), Some("Lecture1"))
        );
        assert_ne!(
            base,
            IdempotencyKey::derive("S001", "CS101", date("2024-01-15"), Some("Lecture2"))
        );
        assert_ne!(
            base,
            IdempotencyKey::derive("S001", "CS101", date("2024-01-15"), None)
        );
    }

    #[test]
    fn key_ignores_status() {
        let mut request = RecordRequest {
            student_id: "S001".to_string(),
            course_id: "CS101".to_string(),
            date: date("2024-01-15"),
            status: AttendanceStatus::Present,
            session_name: None,
        };
        let first = request.idempotency_key();
        request.status = AttendanceStatus::Late;
        assert_eq!(first, request.idempotency_key());
    }

    #[test]
    fn status_parses_lowercase_names() {
        assert_eq!(
            "present".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Present
        );
        assert_eq!(
            "excused".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Excused
        );
        assert!("PRESENT".parse::<AttendanceStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&AttendanceStatus::Late).unwrap();
        assert_eq!(json, "\"late\"");
    }
}
