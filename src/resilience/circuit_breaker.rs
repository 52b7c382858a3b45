//! Circuit breaker for peer service protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: testing if the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_threshold consecutive failures
//! Open → Half-Open: next call attempt after open_timeout has elapsed
//! Half-Open → Closed: success_threshold consecutive successes
//! Half-Open → Open: any failure (restarts the timeout clock)
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker (not global), owned by the DependencyRegistry
//! - The Open → Half-Open transition is lazy: no timer task, the first call
//!   after the window performs it
//! - All state lives behind one mutex so concurrent callers observe a single
//!   consistent transition
//! - What counts as a failure is the caller's decision; the breaker only
//!   sees `Result`

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::metrics;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Dependency presumed unhealthy, calls rejected without being invoked.
    Open,
    /// Probing whether the dependency recovered.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Thresholds and timing for a breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes.
    pub success_threshold: u32,
    /// How long the circuit stays open before the next probe is allowed.
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(15),
        }
    }
}

/// Rejection raised while the circuit is open. The protected operation was
/// not invoked.
#[derive(Debug, Clone, Error)]
#[error("circuit for '{dependency}' is open, retry in {}ms", .retry_in.as_millis())]
pub struct CircuitOpenError {
    /// Dependency the breaker guards.
    pub dependency: String,
    /// Time until the next probe window.
    pub retry_in: Duration,
}

/// Outcome of a guarded call: rejected fast, or the operation's own error.
#[derive(Debug, Error)]
pub enum CircuitError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    #[error(transparent)]
    Inner(E),
}

/// Serializable snapshot of a breaker, for dashboards and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyState {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_secs: u64,
}

struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    /// Monotonic clock for the open window.
    last_failure: Option<Instant>,
    /// Wall clock for snapshots.
    last_failure_time: Option<DateTime<Utc>>,
}

/// Circuit breaker guarding one named remote dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker for a dependency.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
                last_failure_time: None,
            }),
        }
    }

    /// Name of the guarded dependency.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute `op` under the breaker.
    ///
    /// `Err` from the operation counts as a failure, `Ok` as a success; the
    /// caller maps its own outcomes (timeout, connect error, bad status)
    /// into that `Result` beforehand. While open, the operation is not
    /// invoked at all.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        self.preflight()?;

        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(CircuitError::Inner(e))
            }
        }
    }

    /// Current state, without forcing the lazy open → half-open transition.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Serializable snapshot for the introspection endpoint.
    pub fn snapshot(&self) -> DependencyState {
        let inner = self.lock();
        DependencyState {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            open_timeout_secs: self.config.open_timeout.as_secs(),
        }
    }

    /// Force the breaker closed, clearing all counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure = None;
        inner.last_failure_time = None;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    /// Admission check. Performs the lazy Open → Half-Open transition when
    /// the open window has elapsed.
    fn preflight(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = inner
            .last_failure
            .map(|at| at.elapsed())
            .unwrap_or(self.config.open_timeout);

        if elapsed >= self.config.open_timeout {
            self.transition(&mut inner, CircuitState::HalfOpen);
            Ok(())
        } else {
            Err(CircuitOpenError {
                dependency: self.name.clone(),
                retry_in: self.config.open_timeout - elapsed,
            })
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                tracing::debug!(
                    dependency = %self.name,
                    successes = inner.success_count,
                    needed = self.config.success_threshold,
                    "Half-open probe succeeded"
                );
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // A concurrent probe reopened the circuit while this call
                // was in flight; its success no longer moves the state.
                tracing::debug!(dependency = %self.name, "Success observed while open");
            }
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        inner.last_failure = Some(Instant::now());
        inner.last_failure_time = Some(Utc::now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {
                // In-flight call admitted before a concurrent reopen; the
                // updated last_failure above already restarted the clock.
            }
        }
    }

    fn transition(&self, inner: &mut BreakerInner, new_state: CircuitState) {
        let old_state = inner.state;
        inner.state = new_state;

        match new_state {
            CircuitState::Closed => {
                inner.failure_count = 0;
                inner.success_count = 0;
            }
            CircuitState::Open => {
                inner.success_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
            }
        }

        tracing::info!(
            dependency = %self.name,
            old_state = %old_state,
            new_state = %new_state,
            failure_count = inner.failure_count,
            success_count = inner.success_count,
            "Circuit breaker state changed"
        );
        metrics::record_circuit_transition(&self.name, &new_state.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker lock poisoned")
    }
}
