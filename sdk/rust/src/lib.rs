//! Client SDK for the Attendance Recording Service.

pub mod client;

pub use client::{AttendanceClient, CircuitInfo, RecordOutcome, RecordSubmission};
