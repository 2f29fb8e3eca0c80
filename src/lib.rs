//! Circuit breakers for calls to unreliable downstream services.
//!
//! A breaker wraps each call. Failures the caller marks as counted are fed to
//! a [`TripDecider`]; once it says so the breaker opens and fails fast with
//! the error that tripped it. [`TwoStateBreaker`] closes again as soon as the
//! open duration has passed, while [`ThreeStateBreaker`] first goes through a
//! sampled half-open trial phase.
//!
//! ```
//! use circuit_guard::{CallError, CircuitBreakerBuilder, CircuitState, TokenBucketConfig};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let breaker = CircuitBreakerBuilder::new("inventory")
//!     .open_duration(Duration::from_secs(30))
//!     .token_bucket(TokenBucketConfig::full(1, 0.1))
//!     .build_three_state::<String>()
//!     .unwrap();
//!
//! for _ in 0..2 {
//!     let _ = breaker
//!         .call(|| async { Err::<(), _>(CallError::counted("timeout".to_string())) })
//!         .await;
//! }
//! assert_eq!(breaker.state().await, CircuitState::Open);
//! # });
//! ```

pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rate_limit;
pub mod tripping;

pub use circuit_breaker::{
    BreakerRegistry, CircuitBreakerBuilder, CircuitBreakerMetrics, CircuitState,
    HalfOpenSampler, LinearScalingSampler, StateChangeNotifier, ThreeStateBreaker,
    TwoStateBreaker,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BreakerConfig, SamplerConfig, TripConfig};
pub use error::{BreakerError, Result};
pub use rate_limit::TokenBucketConfig;
pub use tripping::{
    CallError, FailureClassifier, FailureSignal, StatusCodeClassifier, TransportClassifier,
    TripDecider,
};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "circuit_guard=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();
}
