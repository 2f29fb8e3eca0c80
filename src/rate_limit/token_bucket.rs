use super::types::TokenBucketConfig;
use std::time::Instant;
use tracing::trace;

/// Token bucket tracking a budget that refills continuously over time.
///
/// The bucket takes `&mut self` for every admission check and carries no lock
/// of its own: whoever owns it serializes access. Breakers keep their bucket
/// behind their own state lock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    initial_tokens: f64,
    tokens: f64,
    /// `None` until the first admission check
    last_refill: Option<Instant>,
}

impl TokenBucket {
    /// Create a new token bucket. Tokens are primed lazily on first use.
    pub fn new(config: &TokenBucketConfig) -> Self {
        let capacity = config.capacity as f64;
        let initial_tokens = (config.initial_tokens as f64).min(capacity);
        Self {
            capacity,
            refill_per_second: config.refill_per_second.max(0.0),
            initial_tokens,
            tokens: initial_tokens,
            last_refill: None,
        }
    }

    /// Spend `cost` tokens if they are available at `now`.
    ///
    /// Returns `false` and leaves the balance untouched when the bucket cannot
    /// cover the cost.
    pub fn allowed(&mut self, cost: u64, now: Instant) -> bool {
        self.refill(now);

        let cost = cost as f64;
        if self.tokens >= cost {
            self.tokens -= cost;
            trace!(cost, remaining = self.tokens, "Token bucket admitted cost");
            true
        } else {
            trace!(cost, remaining = self.tokens, "Token bucket exhausted");
            false
        }
    }

    /// Current balance, as of the last admission check
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&mut self, now: Instant) {
        let last = match self.last_refill {
            Some(last) => last,
            None => {
                self.tokens = self.initial_tokens;
                self.last_refill = Some(now);
                return;
            }
        };

        // A clock that reads earlier than the last refill adds nothing.
        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        if now > last {
            self.last_refill = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bucket(capacity: u64, refill_per_second: f64, initial_tokens: u64) -> TokenBucket {
        TokenBucket::new(&TokenBucketConfig {
            capacity,
            refill_per_second,
            initial_tokens,
        })
    }

    #[test]
    fn test_same_instant_grants_at_most_initial_tokens() {
        let mut bucket = bucket(10, 100.0, 3);
        let now = Instant::now();

        let granted = (0..50).filter(|_| bucket.allowed(1, now)).count();
        assert_eq!(granted, 3);
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_denied_cost_does_not_spend_tokens() {
        let mut bucket = bucket(5, 0.0, 2);
        let now = Instant::now();

        assert!(!bucket.allowed(3, now));
        assert_eq!(bucket.tokens(), 2.0);
        assert!(bucket.allowed(2, now));
        assert_eq!(bucket.tokens(), 0.0);
    }

    #[test]
    fn test_refill_is_proportional_to_elapsed_time() {
        let mut bucket = bucket(10, 2.0, 0);
        let start = Instant::now();

        assert!(!bucket.allowed(1, start));
        // 1.5s at 2 tokens/s
        assert!(bucket.allowed(3, start + Duration::from_millis(1500)));
        assert!(!bucket.allowed(1, start + Duration::from_millis(1500)));
    }

    #[test]
    fn test_refill_never_exceeds_capacity() {
        let mut bucket = bucket(4, 1000.0, 0);
        let start = Instant::now();

        bucket.allowed(0, start);
        assert!(bucket.allowed(0, start + Duration::from_secs(3600)));
        assert_eq!(bucket.tokens(), 4.0);
        assert!(!bucket.allowed(5, start + Duration::from_secs(3600)));
    }

    #[test]
    fn test_fractional_refill_accumulates() {
        let mut bucket = bucket(1, 0.25, 0);
        let start = Instant::now();
        bucket.allowed(0, start);

        for second in 1..4 {
            assert!(!bucket.allowed(1, start + Duration::from_secs(second)));
        }
        assert!(bucket.allowed(1, start + Duration::from_secs(4)));
    }

    #[test]
    fn test_clock_going_backwards_adds_nothing() {
        let mut bucket = bucket(10, 10.0, 1);
        let start = Instant::now() + Duration::from_secs(10);

        assert!(bucket.allowed(1, start));
        assert!(!bucket.allowed(1, start - Duration::from_secs(5)));
        assert!(bucket.tokens() >= 0.0);
    }

    #[test]
    fn test_tokens_stay_within_bounds() {
        let mut bucket = bucket(3, 0.7, 3);
        let start = Instant::now();

        for step in 0..200u64 {
            let now = start + Duration::from_millis(step * 37);
            let _ = bucket.allowed(step % 3 + 1, now);
            assert!(bucket.tokens() >= 0.0);
            assert!(bucket.tokens() <= bucket.capacity());
        }
    }
}
