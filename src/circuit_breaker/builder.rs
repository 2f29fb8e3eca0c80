use super::shared::CoreParts;
use super::notifier::StateChangeNotifier;
use super::sampler::{AlwaysSample, HalfOpenSampler};
use super::three_state::ThreeStateBreaker;
use super::two_state::TwoStateBreaker;
use super::types::CircuitState;
use crate::clock::{Clock, SystemClock};
use crate::error::{BreakerError, Result};
use crate::rate_limit::TokenBucketConfig;
use crate::tripping::{TokenBucketDecider, TripDecider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Open duration used when none is configured
pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum DeciderChoice {
    Custom(Box<dyn TripDecider>),
    TokenBucket(TokenBucketConfig),
}

/// Collects the settings shared by both breaker variants.
///
/// A trip decider is required, either a custom one through
/// [`trip_decider`](Self::trip_decider) or the token bucket budget through
/// [`token_bucket`](Self::token_bucket). Whichever is set last wins.
///
/// ```
/// use circuit_guard::{CircuitBreakerBuilder, TokenBucketConfig};
/// use std::time::Duration;
///
/// let breaker = CircuitBreakerBuilder::new("payments")
///     .open_duration(Duration::from_secs(10))
///     .token_bucket(TokenBucketConfig::full(5, 1.0))
///     .successes_to_close(3)
///     .build_three_state::<String>()
///     .unwrap();
/// assert_eq!(breaker.name(), "payments");
/// ```
#[derive(Debug)]
pub struct CircuitBreakerBuilder {
    name: String,
    open_duration: Duration,
    decider: Option<DeciderChoice>,
    notifier: StateChangeNotifier,
    clock: Arc<dyn Clock>,
    sampler: Option<Box<dyn HalfOpenSampler>>,
    successes_to_close: Option<u32>,
}

impl CircuitBreakerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            open_duration: DEFAULT_OPEN_DURATION,
            decider: None,
            notifier: StateChangeNotifier::disabled(),
            clock: Arc::new(SystemClock),
            sampler: None,
            successes_to_close: None,
        }
    }

    /// How long a tripped breaker fails fast before trying again
    pub fn open_duration(mut self, open_duration: Duration) -> Self {
        self.open_duration = open_duration;
        self
    }

    /// Decide when counted failures trip the breaker
    pub fn trip_decider(self, decider: impl TripDecider + 'static) -> Self {
        self.boxed_trip_decider(Box::new(decider))
    }

    pub fn boxed_trip_decider(mut self, decider: Box<dyn TripDecider>) -> Self {
        self.decider = Some(DeciderChoice::Custom(decider));
        self
    }

    /// Trip once counted failures exhaust a token bucket. The configuration
    /// is validated when the breaker is built.
    pub fn token_bucket(mut self, config: TokenBucketConfig) -> Self {
        self.decider = Some(DeciderChoice::TokenBucket(config));
        self
    }

    /// Send every state change to `sender`
    pub fn on_state_change(mut self, sender: mpsc::Sender<CircuitState>) -> Self {
        self.notifier = StateChangeNotifier::new(sender);
        self
    }

    pub fn notifier(mut self, notifier: StateChangeNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Use a clock already shared with other breakers
    pub fn shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Pick which half-open calls are attempted. Three-state breakers only.
    pub fn half_open_sampler(mut self, sampler: impl HalfOpenSampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Successful trial calls needed to close a half-open breaker. Three-state
    /// breakers only; defaults to 1.
    pub fn successes_to_close(mut self, successes: u32) -> Self {
        self.successes_to_close = Some(successes);
        self
    }

    pub fn build_two_state<E: Clone>(self) -> Result<TwoStateBreaker<E>> {
        if self.sampler.is_some() {
            return Err(BreakerError::config(format!(
                "Breaker '{}': a half-open sampler requires a three-state breaker",
                self.name
            )));
        }
        if self.successes_to_close.is_some() {
            return Err(BreakerError::config(format!(
                "Breaker '{}': successes_to_close requires a three-state breaker",
                self.name
            )));
        }

        Ok(TwoStateBreaker::from_parts(self.into_parts()?))
    }

    pub fn build_three_state<E: Clone>(mut self) -> Result<ThreeStateBreaker<E>> {
        let successes_to_close = self.successes_to_close.unwrap_or(1);
        if successes_to_close == 0 {
            return Err(BreakerError::config(format!(
                "Breaker '{}': successes_to_close must be at least 1",
                self.name
            )));
        }
        let sampler: Box<dyn HalfOpenSampler> = match self.sampler.take() {
            Some(sampler) => sampler,
            None => Box::new(AlwaysSample),
        };

        Ok(ThreeStateBreaker::from_parts(
            self.into_parts()?,
            sampler,
            successes_to_close,
        ))
    }

    fn into_parts(self) -> Result<CoreParts> {
        if self.name.is_empty() {
            return Err(BreakerError::config("Breaker name cannot be empty"));
        }

        let decider: Box<dyn TripDecider> = match self.decider {
            Some(DeciderChoice::Custom(decider)) => decider,
            Some(DeciderChoice::TokenBucket(config)) => {
                config.validate()?;
                Box::new(TokenBucketDecider::new(&config))
            }
            None => {
                return Err(BreakerError::config(format!(
                    "Breaker '{}' has no trip decider",
                    self.name
                )))
            }
        };

        Ok(CoreParts {
            name: self.name,
            open_duration: self.open_duration,
            clock: self.clock,
            notifier: self.notifier,
            decider,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::sampler::LinearScalingSampler;
    use crate::tripping::AlwaysTrip;

    #[test]
    fn test_missing_decider_is_rejected() {
        let result = CircuitBreakerBuilder::new("backend").build_three_state::<String>();
        assert!(matches!(result, Err(BreakerError::Config(_))));
    }

    #[test]
    fn test_invalid_token_bucket_is_rejected() {
        let result = CircuitBreakerBuilder::new("backend")
            .token_bucket(TokenBucketConfig {
                capacity: 2,
                refill_per_second: 1.0,
                initial_tokens: 5,
            })
            .build_two_state::<String>();
        assert!(matches!(result, Err(BreakerError::Config(_))));
    }

    #[test]
    fn test_zero_successes_to_close_is_rejected() {
        let result = CircuitBreakerBuilder::new("backend")
            .trip_decider(AlwaysTrip)
            .successes_to_close(0)
            .build_three_state::<String>();
        assert!(result.is_err());
    }

    #[test]
    fn test_half_open_settings_need_three_states() {
        let result = CircuitBreakerBuilder::new("backend")
            .trip_decider(AlwaysTrip)
            .half_open_sampler(LinearScalingSampler::new(Duration::from_secs(1), 0.5))
            .build_two_state::<String>();
        assert!(result.is_err());

        let result = CircuitBreakerBuilder::new("backend")
            .trip_decider(AlwaysTrip)
            .successes_to_close(2)
            .build_two_state::<String>();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let result = CircuitBreakerBuilder::new("")
            .trip_decider(AlwaysTrip)
            .build_two_state::<String>();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_builds_closed_breakers() {
        let two: TwoStateBreaker<String> = CircuitBreakerBuilder::new("two")
            .token_bucket(TokenBucketConfig::full(3, 0.5))
            .build_two_state()
            .unwrap();
        assert_eq!(two.state().await, CircuitState::Closed);
        assert_eq!(two.name(), "two");

        let three: ThreeStateBreaker<String> = CircuitBreakerBuilder::new("three")
            .trip_decider(AlwaysTrip)
            .half_open_sampler(AlwaysSample)
            .build_three_state()
            .unwrap();
        assert_eq!(three.state().await, CircuitState::Closed);
        assert_eq!(three.half_open_successes().await, None);
    }
}
