//! Outbound domain events.
//!
//! # Data Flow
//! ```text
//! recorder (new record)
//!     → publisher.rs enqueue (bounded channel, never blocks)
//!     → worker task drains the queue
//!     → EventSink::publish (at-least-once, e.g. a message broker)
//! ```
//!
//! # Design Decisions
//! - The recorder never waits on downstream delivery; choreography means
//!   consumers react to events on their own schedule
//! - The queue is bounded; overflow is counted and logged, not buffered
//!   without limit
//! - The sink is a trait so tests and deployments swap transports without
//!   touching the recorder

pub mod publisher;

pub use publisher::{AttendanceEvent, EventPublisher, EventSink, EventWorker, LogSink, SinkError};
