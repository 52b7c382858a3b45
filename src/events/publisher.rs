//! Bounded outbound event queue and its drain worker.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::attendance::model::{AttendanceRecord, AttendanceStatus};
use crate::observability::metrics;

/// Domain event emitted after a new record is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub event: String,
    pub student_id: String,
    pub course_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

impl AttendanceEvent {
    pub fn recorded(record: &AttendanceRecord) -> Self {
        Self {
            event: "attendance_recorded".to_string(),
            student_id: record.student_id.clone(),
            course_id: record.course_id.clone(),
            date: record.date,
            status: record.status,
        }
    }
}

/// Delivery failure reported by a sink.
#[derive(Debug, Error)]
#[error("event delivery failed: {0}")]
pub struct SinkError(pub String);

/// Transport delivering events to downstream consumers, at-least-once.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &AttendanceEvent) -> Result<(), SinkError>;
}

/// Default sink: writes the event as a structured log line.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn publish(&self, event: &AttendanceEvent) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event).map_err(|e| SinkError(e.to_string()))?;
        tracing::info!(event = %payload, "Outbound event published");
        Ok(())
    }
}

/// Handle used by the recorder to hand off events. Cheap to clone.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<AttendanceEvent>,
}

impl EventPublisher {
    /// Enqueue without waiting. A full queue drops the event and counts it;
    /// the recorder's response does not depend on downstream delivery.
    pub fn enqueue(&self, event: AttendanceEvent) {
        match self.tx.try_send(event) {
            Ok(()) => metrics::record_event("enqueued"),
            Err(mpsc::error::TrySendError::Full(event)) => {
                metrics::record_event("dropped");
                tracing::error!(
                    student_id = %event.student_id,
                    course_id = %event.course_id,
                    "Outbound queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                metrics::record_event("dropped");
                tracing::warn!("Outbound queue closed, event dropped");
            }
        }
    }
}

/// Background task draining the queue into the sink.
pub struct EventWorker {
    rx: mpsc::Receiver<AttendanceEvent>,
    sink: Arc<dyn EventSink>,
}

impl EventWorker {
    /// Build the bounded queue, returning the enqueue handle and the worker.
    pub fn channel(capacity: usize, sink: Arc<dyn EventSink>) -> (EventPublisher, EventWorker) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventPublisher { tx }, EventWorker { rx, sink })
    }

    /// Drain the queue until shutdown, then flush whatever is left.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!("Event worker starting");
        loop {
            tokio::select! {
                received = self.rx.recv() => {
                    match received {
                        Some(event) => self.deliver(event).await,
                        None => break,
                    }
                }
                _ = shutdown.recv() => {
                    while let Ok(event) = self.rx.try_recv() {
                        self.deliver(event).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("Event worker stopped");
    }

    async fn deliver(&self, event: AttendanceEvent) {
        match self.sink.publish(&event).await {
            Ok(()) => metrics::record_event("delivered"),
            Err(e) => {
                metrics::record_event("failed");
                tracing::error!(
                    student_id = %event.student_id,
                    course_id = %event.course_id,
                    error = %e,
                    "Event delivery failed"
                );
            }
        }
    }
}
