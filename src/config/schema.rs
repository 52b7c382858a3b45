//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! attendance service. All types derive Serde traits for deserialization
//! from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the attendance service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Peer service endpoints used for cross-service validation.
    pub services: ServicesConfig,

    /// Circuit breaker settings, shared by all remote dependencies.
    pub resilience: ResilienceConfig,

    /// Bulkhead pools, one per operation class.
    pub bulkheads: Vec<BulkheadConfig>,

    /// Attendance store settings.
    pub storage: StorageConfig,

    /// Outbound event queue settings.
    pub events: EventsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5005").
    pub bind_address: String,

    /// Inbound request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5005".to_string(),
            request_timeout_secs: 30,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Peer service endpoints.
///
/// Each referenced entity type is owned by exactly one service; validation
/// calls its canonical resource endpoint instead of a database foreign key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Base URL of the student service.
    pub student_service_url: String,

    /// Base URL of the course service.
    pub course_service_url: String,

    /// Deadline for a single existence check, in seconds.
    pub check_timeout_secs: u64,

    /// Also verify the student is enrolled in the course before recording.
    /// Enrollment is a secondary signal: an unreachable course service
    /// does not block the write when only this check fails.
    pub check_enrollment: bool,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            student_service_url: "http://localhost:5001".to_string(),
            course_service_url: "http://localhost:5002".to_string(),
            check_timeout_secs: 3,
            check_enrollment: false,
        }
    }
}

/// Circuit breaker settings applied to every remote dependency.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Consecutive successes in half-open before the circuit closes.
    pub success_threshold: u32,

    /// Seconds the circuit stays open before the next probe is allowed.
    pub open_timeout_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout_secs: 15,
        }
    }
}

/// A single bulkhead pool bounding concurrency for one operation class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkheadConfig {
    /// Pool name (e.g., "validation").
    pub name: String,

    /// Maximum concurrent operations admitted.
    pub max_concurrent: usize,

    /// Reject immediately when exhausted instead of waiting.
    #[serde(default)]
    pub fail_fast: bool,

    /// Maximum wait for a permit when `fail_fast` is false, in milliseconds.
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

fn default_wait_timeout_ms() -> u64 {
    15_000
}

impl BulkheadConfig {
    /// The pool protecting cross-service validation calls.
    pub fn validation_default() -> Self {
        Self {
            name: "validation".to_string(),
            max_concurrent: 20,
            fail_fast: false,
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

/// Attendance store settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Optional JSON snapshot file for the in-memory store.
    pub persistence_path: Option<String>,
}

/// Outbound event queue settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Bounded capacity of the outbound event queue.
    pub queue_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Bind address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9095".to_string(),
        }
    }
}

impl AppConfig {
    /// Bulkhead pools to register, with the validation pool guaranteed.
    pub fn bulkhead_pools(&self) -> Vec<BulkheadConfig> {
        let mut pools = self.bulkheads.clone();
        if !pools.iter().any(|p| p.name == "validation") {
            pools.push(BulkheadConfig::validation_default());
        }
        pools
    }
}
