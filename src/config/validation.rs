//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, timeouts > 0)
//! - Check peer service URLs parse and use an http scheme
//! - Detect duplicate bulkhead pool names
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic configuration problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, field: &str, message: impl Into<String>) {
    errors.push(ValidationError {
        field: field.to_string(),
        message: message.into(),
    });
}

fn check_service_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => err(errors, field, format!("unsupported scheme '{}'", url.scheme())),
        Err(e) => err(errors, field, format!("invalid URL: {}", e)),
    }
}

/// Validate the full configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        err(
            &mut errors,
            "listener.bind_address",
            "not a valid socket address",
        );
    }
    if config.listener.request_timeout_secs == 0 {
        err(&mut errors, "listener.request_timeout_secs", "must be > 0");
    }

    check_service_url(
        &mut errors,
        "services.student_service_url",
        &config.services.student_service_url,
    );
    check_service_url(
        &mut errors,
        "services.course_service_url",
        &config.services.course_service_url,
    );
    if config.services.check_timeout_secs == 0 {
        err(&mut errors, "services.check_timeout_secs", "must be > 0");
    }

    if config.resilience.failure_threshold == 0 {
        err(&mut errors, "resilience.failure_threshold", "must be > 0");
    }
    if config.resilience.success_threshold == 0 {
        err(&mut errors, "resilience.success_threshold", "must be > 0");
    }
    if config.resilience.open_timeout_secs == 0 {
        err(&mut errors, "resilience.open_timeout_secs", "must be > 0");
    }

    let mut seen = HashSet::new();
    for pool in &config.bulkheads {
        if pool.max_concurrent == 0 {
            err(
                &mut errors,
                "bulkheads.max_concurrent",
                format!("pool '{}' must admit at least one operation", pool.name),
            );
        }
        if !seen.insert(pool.name.clone()) {
            err(
                &mut errors,
                "bulkheads.name",
                format!("duplicate pool '{}'", pool.name),
            );
        }
    }

    if config.events.queue_capacity == 0 {
        err(&mut errors, "events.queue_capacity", "must be > 0");
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        err(
            &mut errors,
            "observability.metrics_address",
            "not a valid socket address",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
