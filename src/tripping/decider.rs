use crate::rate_limit::{TokenBucket, TokenBucketConfig};
use std::collections::VecDeque;
use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Policy deciding when a closed breaker trips open.
///
/// Breakers keep their decider behind their state lock, so implementations
/// get `&mut self` and need no synchronization of their own.
pub trait TripDecider: Debug + Send + Sync {
    /// Record a counted failure weighing `cost` at `now`; return true to trip
    fn should_trip(&mut self, cost: u64, now: Instant) -> bool;

    /// Record a successful call made while closed.
    ///
    /// Only invoked when [`observes_successes`](TripDecider::observes_successes)
    /// returns true, since it costs the breaker an exclusive lock per success.
    fn on_success(&mut self, _now: Instant) {}

    fn observes_successes(&self) -> bool {
        false
    }

    /// Called every time the breaker closes again
    fn reset(&mut self) {}
}

/// Trips once failures spend more than a refilling token budget.
///
/// This is the general-purpose policy: the capacity is the burst of failures
/// tolerated, the refill rate the sustained failure rate tolerated.
#[derive(Debug, Clone)]
pub struct TokenBucketDecider {
    bucket: TokenBucket,
}

impl TokenBucketDecider {
    pub fn new(config: &TokenBucketConfig) -> Self {
        Self {
            bucket: TokenBucket::new(config),
        }
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }
}

impl TripDecider for TokenBucketDecider {
    fn should_trip(&mut self, cost: u64, now: Instant) -> bool {
        !self.bucket.allowed(cost, now)
    }
}

/// Trips after `threshold` worth of failure cost with no success in between
#[derive(Debug, Clone)]
pub struct ConsecutiveFailures {
    threshold: u64,
    accumulated: u64,
}

impl ConsecutiveFailures {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            accumulated: 0,
        }
    }
}

impl TripDecider for ConsecutiveFailures {
    fn should_trip(&mut self, cost: u64, _now: Instant) -> bool {
        self.accumulated = self.accumulated.saturating_add(cost);
        self.accumulated >= self.threshold
    }

    fn on_success(&mut self, _now: Instant) {
        self.accumulated = 0;
    }

    fn observes_successes(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        self.accumulated = 0;
    }
}

/// Trips once `threshold` worth of failure cost lands within `window`.
/// Failures older than the window are forgotten.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    threshold: u64,
    window: Duration,
    failures: VecDeque<(Instant, u64)>,
    total: u64,
}

impl SlidingWindow {
    pub fn new(threshold: u64, window: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            window,
            failures: VecDeque::new(),
            total: 0,
        }
    }

    fn evict_before(&mut self, now: Instant) {
        while let Some(&(at, cost)) = self.failures.front() {
            if now.saturating_duration_since(at) < self.window {
                break;
            }
            self.failures.pop_front();
            self.total = self.total.saturating_sub(cost);
        }
    }
}

impl TripDecider for SlidingWindow {
    fn should_trip(&mut self, cost: u64, now: Instant) -> bool {
        self.evict_before(now);
        self.failures.push_back((now, cost));
        self.total = self.total.saturating_add(cost);
        self.total >= self.threshold
    }

    fn reset(&mut self) {
        self.failures.clear();
        self.total = 0;
    }
}

/// Trips on the first counted failure
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrip;

impl TripDecider for AlwaysTrip {
    fn should_trip(&mut self, _cost: u64, _now: Instant) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_decider_trips_when_budget_spent() {
        let mut decider = TokenBucketDecider::new(&TokenBucketConfig::full(2, 0.0));
        let now = Instant::now();

        assert!(!decider.should_trip(1, now));
        assert!(!decider.should_trip(1, now));
        assert!(decider.should_trip(1, now));
    }

    #[test]
    fn test_token_bucket_decider_weighs_cost() {
        let mut decider = TokenBucketDecider::new(&TokenBucketConfig::full(5, 0.0));
        let now = Instant::now();

        assert!(!decider.should_trip(4, now));
        assert!(decider.should_trip(2, now));
        // the rejected cost was not spent
        assert!(!decider.should_trip(1, now));
    }

    #[test]
    fn test_token_bucket_decider_recovers_with_time() {
        let mut decider = TokenBucketDecider::new(&TokenBucketConfig::full(1, 1.0));
        let start = Instant::now();

        assert!(!decider.should_trip(1, start));
        assert!(decider.should_trip(1, start));
        assert!(!decider.should_trip(1, start + Duration::from_secs(1)));
    }

    #[test]
    fn test_consecutive_failures_reset_on_success() {
        let mut decider = ConsecutiveFailures::new(3);
        let now = Instant::now();

        assert!(decider.observes_successes());
        assert!(!decider.should_trip(1, now));
        assert!(!decider.should_trip(1, now));
        decider.on_success(now);
        assert!(!decider.should_trip(1, now));
        assert!(!decider.should_trip(1, now));
        assert!(decider.should_trip(1, now));

        decider.reset();
        assert!(!decider.should_trip(1, now));
    }

    #[test]
    fn test_sliding_window_forgets_old_failures() {
        let mut decider = SlidingWindow::new(3, Duration::from_secs(10));
        let start = Instant::now();

        assert!(!decider.should_trip(1, start));
        assert!(!decider.should_trip(1, start + Duration::from_secs(5)));
        // the first failure has aged out
        assert!(!decider.should_trip(1, start + Duration::from_secs(11)));
        assert!(decider.should_trip(1, start + Duration::from_secs(12)));
    }

    #[test]
    fn test_sliding_window_reset() {
        let mut decider = SlidingWindow::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(!decider.should_trip(1, now));
        decider.reset();
        assert!(!decider.should_trip(1, now));
        assert!(decider.should_trip(1, now));
    }

    #[test]
    fn test_always_trip() {
        assert!(AlwaysTrip.should_trip(1, Instant::now()));
        assert!(!AlwaysTrip.observes_successes());
    }
}
