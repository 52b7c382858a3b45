//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a peer service:
//!     → bulkhead.rs (bound concurrent load for the operation class)
//!     → timeouts.rs (enforce per-call deadline)
//!     → circuit_breaker.rs (track outcomes, fail fast while unhealthy)
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline; a missed deadline is a failure
//! - The breaker is outcome-agnostic: the caller decides what is a failure,
//!   so a 404 existence check never opens a circuit
//! - One breaker per dependency, one bulkhead per operation class, all owned
//!   by an injected DependencyRegistry — never module-level globals
//! - Retries stay on the caller's side; this layer only makes them safe

pub mod bulkhead;
pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;

pub use bulkhead::{Bulkhead, BulkheadFullError, BulkheadPermit, BulkheadStats};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitError, CircuitOpenError, CircuitState,
    DependencyState,
};
pub use registry::DependencyRegistry;
pub use timeouts::TimeoutPolicy;
