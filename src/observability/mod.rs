//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → structured tracing events (stdout, env-filtered)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric updates are cheap atomic increments; call sites use the
//!   record_* helpers rather than raw macro invocations
//! - Labels are bounded sets (dependency, pool, outcome) — never record ids

pub mod metrics;
