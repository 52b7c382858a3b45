//! Attendance persistence with storage-enforced uniqueness.
//!
//! # Responsibilities
//! - Insert records atomically, at most one per idempotency key
//! - Serve filtered record listings and per-student/course summaries
//! - Optionally snapshot the in-memory store to a JSON file
//!
//! # Design Decisions
//! - Uniqueness lives in the store, not in callers: `insert_unique` resolves
//!   the duplicate race inside one map-entry critical section, so two
//!   concurrent submissions of the same event converge on one record
//! - The store is a trait; the default implementation is an in-process
//!   concurrent map with file persistence, and a database-backed service
//!   implements the same trait against its unique index

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attendance::model::{AttendanceRecord, AttendanceStatus, IdempotencyKey};
use crate::observability::metrics;

/// Storage-layer fault unrelated to uniqueness.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result of an atomic unique insert.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The record was stored; no prior record shared its key.
    Inserted(AttendanceRecord),
    /// A record with the same key already existed; it is returned unchanged.
    Duplicate(AttendanceRecord),
}

/// Filters for record listings. All fields are conjunctive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    pub student_id: Option<String>,
    pub course_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub session_name: Option<String>,
}

impl RecordFilter {
    fn matches(&self, record: &AttendanceRecord) -> bool {
        self.student_id
            .as_deref()
            .is_none_or(|v| record.student_id == v)
            && self.course_id.as_deref().is_none_or(|v| record.course_id == v)
            && self.date.is_none_or(|v| record.date == v)
            && self
                .session_name
                .as_deref()
                .is_none_or(|v| record.session_name.as_deref() == Some(v))
    }
}

/// Per-status counts for one student, optionally scoped to a course.
#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub student_id: String,
    pub course_id: Option<String>,
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub excused: u64,
    pub attendance_percentage: f64,
}

/// Per-status counts for one course, optionally scoped to a date.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    pub course_id: String,
    pub date: Option<NaiveDate>,
    pub total: u64,
    pub present: u64,
    pub absent: u64,
    pub late: u64,
    pub excused: u64,
}

#[derive(Debug, Default)]
struct StatusCounts {
    present: u64,
    absent: u64,
    late: u64,
    excused: u64,
}

impl StatusCounts {
    fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Excused => self.excused += 1,
        }
    }

    fn total(&self) -> u64 {
        self.present + self.absent + self.late + self.excused
    }
}

/// Persistent store for attendance records.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Insert `record` unless a record with the same idempotency key exists.
    /// The check and the insert are one atomic step.
    async fn insert_unique(&self, record: AttendanceRecord) -> Result<InsertOutcome, StoreError>;

    /// Fetch the record stored under `key`.
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<AttendanceRecord>, StoreError>;

    /// List records matching `filter`, newest first.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, StoreError>;

    /// Per-status counts for a student.
    async fn student_summary(
        &self,
        student_id: &str,
        course_id: Option<&str>,
    ) -> Result<StudentSummary, StoreError>;

    /// Per-status counts for a course.
    async fn course_summary(
        &self,
        course_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<CourseSummary, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StoreError>;
}

/// In-process store: a concurrent map keyed by idempotency key, with an
/// optional JSON snapshot file.
pub struct MemoryStore {
    records: DashMap<String, AttendanceRecord>,
    persistence_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            records: DashMap::new(),
            persistence_path,
        }
    }

    /// Load the snapshot at `path` if it exists, otherwise start empty.
    pub fn load_from_file(path: &Path) -> Result<Self, StoreError> {
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            let map: HashMap<String, AttendanceRecord> = serde_json::from_reader(reader)?;
            for (key, record) in map {
                store.records.insert(key, record);
            }
            metrics::record_store_size(store.records.len());
            tracing::info!(
                records = store.records.len(),
                path = %path.display(),
                "Loaded attendance records from snapshot"
            );
        }
        Ok(store)
    }

    /// Write the snapshot file, if one is configured.
    pub fn save_to_file(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.persistence_path {
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            let map: HashMap<_, _> = self
                .records
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();
            serde_json::to_writer(writer, &map)?;
            tracing::info!(records = map.len(), path = %path.display(), "Saved attendance snapshot");
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn insert_unique(&self, record: AttendanceRecord) -> Result<InsertOutcome, StoreError> {
        use dashmap::mapref::entry::Entry;

        let key = record.idempotency_key.as_str().to_string();
        let outcome = match self.records.entry(key) {
            Entry::Occupied(existing) => InsertOutcome::Duplicate(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                InsertOutcome::Inserted(record)
            }
        };
        metrics::record_store_size(self.records.len());
        Ok(outcome)
    }

    async fn get(&self, key: &IdempotencyKey) -> Result<Option<AttendanceRecord>, StoreError> {
        Ok(self.records.get(key.as_str()).map(|r| r.value().clone()))
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut matching: Vec<_> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.recorded_at.cmp(&a.recorded_at))
        });
        Ok(matching)
    }

    async fn student_summary(
        &self,
        student_id: &str,
        course_id: Option<&str>,
    ) -> Result<StudentSummary, StoreError> {
        let mut counts = StatusCounts::default();
        for r in self.records.iter() {
            let record = r.value();
            if record.student_id == student_id
                && course_id.is_none_or(|c| record.course_id == c)
            {
                counts.add(record.status);
            }
        }

        let total = counts.total();
        let attendance_percentage = if total > 0 {
            let attended = (counts.present + counts.late) as f64;
            (attended / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(StudentSummary {
            student_id: student_id.to_string(),
            course_id: course_id.map(str::to_string),
            total,
            present: counts.present,
            absent: counts.absent,
            late: counts.late,
            excused: counts.excused,
            attendance_percentage,
        })
    }

    async fn course_summary(
        &self,
        course_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<CourseSummary, StoreError> {
        let mut counts = StatusCounts::default();
        for r in self.records.iter() {
            let record = r.value();
            if record.course_id == course_id && date.is_none_or(|d| record.date == d) {
                counts.add(record.status);
            }
        }

        Ok(CourseSummary {
            course_id: course_id.to_string(),
            date,
            total: counts.total(),
            present: counts.present,
            absent: counts.absent,
            late: counts.late,
            excused: counts.excused,
        })
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }
}
