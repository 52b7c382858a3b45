//! Shared registry of per-dependency breakers and per-class bulkheads.
//!
//! # Responsibilities
//! - Own exactly one CircuitBreaker per named remote dependency
//! - Own exactly one Bulkhead per operation class
//! - Expose snapshots for the introspection endpoint
//!
//! # Design Decisions
//! - The registry is created once in main and injected everywhere as an
//!   Arc; components never hold their own copy of health state
//! - Breakers are created lazily on first use with the process-wide
//!   settings, so every caller naming the same dependency shares state

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::schema::{BulkheadConfig, ResilienceConfig};
use crate::resilience::bulkhead::{Bulkhead, BulkheadStats};
use crate::resilience::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, DependencyState,
};

/// Process-wide owner of dependency health state.
pub struct DependencyRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    pools: DashMap<String, Arc<Bulkhead>>,
    breaker_config: CircuitBreakerConfig,
}

impl DependencyRegistry {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            pools: DashMap::new(),
            breaker_config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold,
                success_threshold: config.success_threshold,
                open_timeout: std::time::Duration::from_secs(config.open_timeout_secs),
            },
        }
    }

    /// The breaker guarding `dependency`, created closed on first use.
    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(dependency, self.breaker_config.clone()))
            })
            .clone()
    }

    /// Register a bulkhead pool from configuration. Replaces any pool with
    /// the same name.
    pub fn register_pool(&self, config: &BulkheadConfig) {
        self.pools
            .insert(config.name.clone(), Arc::new(Bulkhead::new(config)));
    }

    /// The pool for an operation class, if configured.
    pub fn pool(&self, class: &str) -> Option<Arc<Bulkhead>> {
        self.pools.get(class).map(|entry| entry.value().clone())
    }

    /// Snapshot of one dependency's circuit, if it has been used.
    pub fn circuit_status(&self, dependency: &str) -> Option<DependencyState> {
        self.breakers
            .get(dependency)
            .map(|entry| entry.value().snapshot())
    }

    /// Snapshots of every known circuit.
    pub fn all_circuits(&self) -> Vec<DependencyState> {
        let mut states: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        states.sort_by(|a, b| a.name.cmp(&b.name));
        states
    }

    /// Force every circuit closed. Management operation.
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
        tracing::info!(circuits = self.breakers.len(), "All circuit breakers reset");
    }

    /// True when any circuit is currently open.
    pub fn any_open(&self) -> bool {
        self.breakers
            .iter()
            .any(|entry| entry.value().state() == CircuitState::Open)
    }

    /// Counters for every bulkhead pool.
    pub fn pool_stats(&self) -> Vec<BulkheadStats> {
        let mut stats: Vec<_> = self
            .pools
            .iter()
            .map(|entry| entry.value().stats())
            .collect();
        stats.sort_by(|a, b| a.pool.cmp(&b.pool));
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ResilienceConfig;

    #[test]
    fn same_dependency_shares_one_breaker() {
        let registry = DependencyRegistry::new(&ResilienceConfig::default());

        let a = registry.breaker("student-service");
        let b = registry.breaker("student-service");
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.breaker("course-service");
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[test]
    fn circuit_status_reports_registered_breakers_only() {
        let registry = DependencyRegistry::new(&ResilienceConfig::default());
        assert!(registry.circuit_status("student-service").is_none());

        registry.breaker("student-service");
        let state = registry.circuit_status("student-service").unwrap();
        assert_eq!(state.state, CircuitState::Closed);
        assert_eq!(state.failure_threshold, 3);
    }

    #[test]
    fn pools_are_looked_up_by_class() {
        let registry = DependencyRegistry::new(&ResilienceConfig::default());
        registry.register_pool(&BulkheadConfig::validation_default());

        assert!(registry.pool("validation").is_some());
        assert!(registry.pool("reporting").is_none());
    }
}
