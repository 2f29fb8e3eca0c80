//! Breaker metrics.
//!
//! Every breaker reports through the `metrics` facade, labelled with its name,
//! and keeps its own in-process counters for [`CircuitBreakerMetrics`]
//! snapshots. Installing a recorder/exporter is left to the application.

use crate::circuit_breaker::{CircuitBreakerMetrics, CircuitState};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub const CALLS_TOTAL: &str = "circuit_breaker_calls_total";
pub const REJECTIONS_TOTAL: &str = "circuit_breaker_rejections_total";
pub const FAILURES_TOTAL: &str = "circuit_breaker_failures_total";
pub const TRANSITIONS_TOTAL: &str = "circuit_breaker_transitions_total";
pub const STATE: &str = "circuit_breaker_state";

/// Register all breaker metrics with descriptions
pub fn describe_metrics() {
    describe_counter!(CALLS_TOTAL, "Total number of calls made through a circuit breaker");
    describe_counter!(
        REJECTIONS_TOTAL,
        "Total number of calls rejected without running the operation"
    );
    describe_counter!(
        FAILURES_TOTAL,
        "Total number of counted failures, weighted by cost"
    );
    describe_counter!(
        TRANSITIONS_TOTAL,
        "Total number of circuit breaker state transitions"
    );
    describe_gauge!(
        STATE,
        "Circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
    );

    debug!("Circuit breaker metrics registered with descriptions");
}

/// Counters owned by a single breaker
#[derive(Debug)]
pub(crate) struct BreakerMetricsRecorder {
    breaker: String,
    calls: AtomicU64,
    rejected: AtomicU64,
    successes: AtomicU64,
    uncounted: AtomicU64,
    failures: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
    half_opened: AtomicU64,
}

impl BreakerMetricsRecorder {
    pub(crate) fn new(breaker: &str) -> Self {
        gauge!(STATE, "breaker" => breaker.to_string()).set(CircuitState::Closed.as_gauge());

        Self {
            breaker: breaker.to_string(),
            calls: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            uncounted: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            half_opened: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        counter!(CALLS_TOTAL, "breaker" => self.breaker.clone()).increment(1);
    }

    pub(crate) fn record_rejection(&self, state: CircuitState) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        counter!(
            REJECTIONS_TOTAL,
            "breaker" => self.breaker.clone(),
            "state" => state.as_str()
        )
        .increment(1);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_uncounted(&self) {
        self.uncounted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, cost: u64) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        counter!(FAILURES_TOTAL, "breaker" => self.breaker.clone()).increment(cost);
    }

    pub(crate) fn record_transition(&self, from: CircuitState, to: CircuitState) {
        let counter = match to {
            CircuitState::Closed => &self.closed,
            CircuitState::Open => &self.opened,
            CircuitState::HalfOpen => &self.half_opened,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        counter!(
            TRANSITIONS_TOTAL,
            "breaker" => self.breaker.clone(),
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        gauge!(STATE, "breaker" => self.breaker.clone()).set(to.as_gauge());
    }

    pub(crate) fn snapshot(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_calls: self.calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected.load(Ordering::Relaxed),
            successful_calls: self.successes.load(Ordering::Relaxed),
            uncounted_errors: self.uncounted.load(Ordering::Relaxed),
            counted_failures: self.failures.load(Ordering::Relaxed),
            circuit_opened_count: self.opened.load(Ordering::Relaxed),
            circuit_closed_count: self.closed.load(Ordering::Relaxed),
            circuit_half_opened_count: self.half_opened.load(Ordering::Relaxed),
        }
    }
}
