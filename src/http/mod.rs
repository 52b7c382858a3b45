//! HTTP delivery surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request-id, timeout, body limit, trace)
//!     → handlers (record / bulk / queries / circuit introspection)
//!     → AttendanceRecorder and AttendanceStore
//!     → typed RecordError mapped to status codes
//! ```
//!
//! # Status Mapping
//! - new record → 201, duplicate → 200 (never an error)
//! - invalid request / absent entity → 400
//! - bulkhead exhausted → 429
//! - circuit open / dependency unreachable → 503 with Retry-After
//! - storage fault → 500

pub mod server;

pub use server::{AppState, HttpServer};
