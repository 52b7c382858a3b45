//! Per-class deadlines for outbound work.
//!
//! # Responsibilities
//! - Hold the deadline each dependency class runs under
//! - Every external call gets a deadline; there is no unbounded wait
//!
//! # Design Decisions
//! - A missed deadline is reported to the circuit breaker as a failure,
//!   indistinguishable from a connection fault
//! - Expiry drops the in-flight future, which cancels the HTTP request

use std::time::Duration;

use crate::config::schema::AppConfig;

/// Deadlines by operation class.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    /// Existence checks against peer services.
    pub validation: Duration,
    /// Inbound request budget for the HTTP surface.
    pub request: Duration,
}

impl TimeoutPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            validation: Duration::from_secs(config.services.check_timeout_secs),
            request: Duration::from_secs(config.listener.request_timeout_secs),
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            validation: Duration::from_secs(3),
            request: Duration::from_secs(30),
        }
    }
}
