//! Two- and three-state circuit breakers.
//!
//! Both variants share the same moving parts: a [`TripDecider`] consulted on
//! counted failures while closed, an injectable [`Clock`], a
//! [`StateChangeNotifier`] and per-breaker metrics. State lives behind a
//! `tokio::sync::RwLock`; guarded operations always run with no lock held,
//! and transition side effects fire after the lock is released.
//!
//! [`TripDecider`]: crate::tripping::TripDecider
//! [`Clock`]: crate::clock::Clock

pub mod builder;
pub mod notifier;
pub mod registry;
pub mod sampler;
mod shared;
pub mod three_state;
pub mod two_state;
pub mod types;

pub use builder::{CircuitBreakerBuilder, DEFAULT_OPEN_DURATION};
pub use notifier::StateChangeNotifier;
pub use registry::BreakerRegistry;
pub use sampler::{AlwaysSample, HalfOpenSampler, LinearScalingSampler};
pub use three_state::ThreeStateBreaker;
pub use two_state::TwoStateBreaker;
pub use types::{BreakerKind, CircuitBreakerMetrics, CircuitState};
