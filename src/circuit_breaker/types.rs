use serde::{Deserialize, Serialize};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, requests flow normally
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, allowing sampled probe requests
    HalfOpen,
}

impl CircuitState {
    /// Value reported on the state gauge
    pub fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Which state machine a breaker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerKind {
    /// Closed and Open only; recloses as soon as the cooldown ends
    TwoState,
    /// Adds a sampled HalfOpen trial phase between Open and Closed
    ThreeState,
}

impl BreakerKind {
    /// Transition table for each state machine
    pub fn allows(self, from: CircuitState, to: CircuitState) -> bool {
        use CircuitState::*;

        match self {
            BreakerKind::TwoState => match (from, to) {
                (Closed, Open) | (Open, Closed) => true,
                (Closed, Closed) | (Open, Open) => false,
                (HalfOpen, _) | (_, HalfOpen) => false,
            },
            BreakerKind::ThreeState => match (from, to) {
                (Closed, Open) | (Open, HalfOpen) | (HalfOpen, Closed) | (HalfOpen, Open) => true,
                (Open, Closed) | (Closed, HalfOpen) => false,
                (Closed, Closed) | (Open, Open) | (HalfOpen, HalfOpen) => false,
            },
        }
    }
}

/// Point-in-time counters for a single breaker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerMetrics {
    /// Number of calls made through the breaker
    pub total_calls: u64,
    /// Calls rejected without running the operation
    pub rejected_calls: u64,
    /// Operations that returned successfully
    pub successful_calls: u64,
    /// Operations that failed with an error the breaker does not count
    pub uncounted_errors: u64,
    /// Operations that failed with a counted failure
    pub counted_failures: u64,
    /// Number of times circuit opened
    pub circuit_opened_count: u64,
    /// Number of times circuit closed
    pub circuit_closed_count: u64,
    /// Number of times circuit half-opened
    pub circuit_half_opened_count: u64,
}
