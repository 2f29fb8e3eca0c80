use super::signal::FailureSignal;
use http::StatusCode;
use std::collections::HashSet;
use thiserror::Error;

/// Decides whether a completed call counts against a breaker.
///
/// Implementations must not have side effects; a breaker may classify the
/// same outcome more than once.
pub trait FailureClassifier<T, E> {
    /// Return a signal if `outcome` is a counted failure, `None` otherwise
    fn classify(&self, outcome: &Result<T, E>) -> Option<FailureSignal<E>>;
}

impl<T, E, F> FailureClassifier<T, E> for F
where
    F: Fn(&Result<T, E>) -> Option<FailureSignal<E>>,
{
    fn classify(&self, outcome: &Result<T, E>) -> Option<FailureSignal<E>> {
        self(outcome)
    }
}

/// Default classifier: every error is a unit-cost failure, every success is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportClassifier;

impl<T, E: Clone> FailureClassifier<T, E> for TransportClassifier {
    fn classify(&self, outcome: &Result<T, E>) -> Option<FailureSignal<E>> {
        match outcome {
            Ok(_) => None,
            Err(e) => Some(FailureSignal::new(e.clone())),
        }
    }
}

/// Raised in place of a response whose status marks the upstream as unhealthy
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("upstream service is down or is rate limiting (status {0})")]
pub struct UpstreamStatus(pub StatusCode);

/// Status codes that trip by default
pub const DEFAULT_TRIPPING_STATUSES: [StatusCode; 5] = [
    // usually the backend is down
    StatusCode::BAD_GATEWAY,
    // some services answer this when overwhelmed
    StatusCode::INTERNAL_SERVER_ERROR,
    // the server's own request timeout expired
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::SERVICE_UNAVAILABLE,
    // the upstream is asking us to slow down
    StatusCode::TOO_MANY_REQUESTS,
];

/// Classifier for HTTP exchanges.
///
/// Transport errors are unit-cost failures. Responses whose status is in the
/// configured set become a unit-cost failure carrying an [`UpstreamStatus`]
/// converted into the caller's error type. Any other response is a success.
#[derive(Debug, Clone)]
pub struct StatusCodeClassifier {
    statuses: HashSet<StatusCode>,
}

impl StatusCodeClassifier {
    pub fn new() -> Self {
        Self::with_statuses(DEFAULT_TRIPPING_STATUSES)
    }

    /// Trip on exactly the given statuses
    pub fn with_statuses(statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
        }
    }

    pub fn is_tripping(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status)
    }
}

impl Default for StatusCodeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, E> FailureClassifier<http::Response<B>, E> for StatusCodeClassifier
where
    E: Clone + From<UpstreamStatus>,
{
    fn classify(&self, outcome: &Result<http::Response<B>, E>) -> Option<FailureSignal<E>> {
        match outcome {
            Err(e) => Some(FailureSignal::new(e.clone())),
            Ok(response) if self.is_tripping(response.status()) => {
                Some(FailureSignal::new(UpstreamStatus(response.status()).into()))
            }
            Ok(_) => None,
        }
    }
}
