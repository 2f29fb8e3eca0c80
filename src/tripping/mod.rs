//! Classification of call outcomes and the policies that decide when to trip.

pub mod classifier;
pub mod decider;
pub mod signal;

pub use classifier::{
    FailureClassifier, StatusCodeClassifier, TransportClassifier, UpstreamStatus,
    DEFAULT_TRIPPING_STATUSES,
};
pub use decider::{AlwaysTrip, ConsecutiveFailures, SlidingWindow, TokenBucketDecider, TripDecider};
pub use signal::{CallError, FailureSignal};
