use super::shared::{BreakerCore, CoreParts, Phase, Transition};
use super::types::{BreakerKind, CircuitBreakerMetrics, CircuitState};
use crate::tripping::{CallError, FailureClassifier, FailureSignal, TransportClassifier};
use std::future::Future;
use std::time::Instant;
use tracing::debug;

#[derive(Debug)]
enum TwoStatePhase<E> {
    Closed,
    Open {
        last_error: E,
        expires_at: Instant,
    },
}

impl<E> Default for TwoStatePhase<E> {
    fn default() -> Self {
        TwoStatePhase::Closed
    }
}

impl<E> Phase for TwoStatePhase<E> {
    fn state(&self) -> CircuitState {
        match self {
            TwoStatePhase::Closed => CircuitState::Closed,
            TwoStatePhase::Open { .. } => CircuitState::Open,
        }
    }
}

/// Circuit breaker with only Closed and Open states.
///
/// Once tripped, every call fails fast with the error that tripped it until
/// the open duration runs out. The first call after that closes the breaker
/// again and goes straight through.
///
/// Build one with [`CircuitBreakerBuilder`](super::CircuitBreakerBuilder).
#[derive(Debug)]
pub struct TwoStateBreaker<E> {
    core: BreakerCore<TwoStatePhase<E>>,
}

impl<E: Clone> TwoStateBreaker<E> {
    pub(crate) fn from_parts(parts: CoreParts) -> Self {
        Self {
            core: BreakerCore::new(parts, BreakerKind::TwoState),
        }
    }

    /// Run `operation` unless the breaker is open.
    ///
    /// The operation marks failures that count against the breaker with
    /// [`CallError::Counted`]. Either way the caller gets back its own error
    /// type. While open, the error that tripped the breaker is returned and
    /// `operation` is never invoked.
    ///
    /// The operation runs without any lock held, so calls already in flight
    /// when the breaker trips still complete.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError<E>>>,
    {
        self.core.metrics.record_call();

        if let Err(cause) = self.admit().await {
            self.core.metrics.record_rejection(CircuitState::Open);
            return Err(cause);
        }

        match operation().await {
            Ok(value) => {
                self.core.metrics.record_success();
                self.core.observe_closed_success().await;
                Ok(value)
            }
            Err(CallError::Uncounted(cause)) => {
                self.core.metrics.record_uncounted();
                self.core.observe_closed_success().await;
                Err(cause)
            }
            Err(CallError::Counted(signal)) => {
                self.record_failure(&signal).await;
                Err(signal.into_cause())
            }
        }
    }

    /// Run `operation` and let `classifier` decide whether its outcome counts
    pub async fn call_classified<C, F, Fut, T>(&self, classifier: &C, operation: F) -> Result<T, E>
    where
        C: FailureClassifier<T, E>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call(|| async move {
            let outcome = operation().await;
            match classifier.classify(&outcome) {
                Some(signal) => Err(CallError::Counted(signal)),
                None => outcome.map_err(CallError::Uncounted),
            }
        })
        .await
    }

    /// Run `operation`, counting every error it returns
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_classified(&TransportClassifier, operation).await
    }

    /// Get current state
    pub async fn state(&self) -> CircuitState {
        self.core.state().await
    }

    /// Get metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.core.metrics.snapshot()
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Fail fast while open; reclose once the open duration has passed
    async fn admit(&self) -> Result<(), E> {
        let now = self.core.clock.now();

        {
            let inner = self.core.inner.read().await;
            match &inner.phase {
                TwoStatePhase::Closed => return Ok(()),
                TwoStatePhase::Open {
                    last_error,
                    expires_at,
                } if now < *expires_at => {
                    debug!(
                        breaker = %self.core.name,
                        time_remaining = ?expires_at.saturating_duration_since(now),
                        "Circuit breaker open, rejecting call"
                    );
                    return Err(last_error.clone());
                }
                TwoStatePhase::Open { .. } => {}
            }
        }

        let transition = {
            let mut inner = self.core.inner.write().await;
            // another caller may have closed or re-tripped the breaker meanwhile
            let expired = match &inner.phase {
                TwoStatePhase::Closed => false,
                TwoStatePhase::Open {
                    last_error,
                    expires_at,
                } if now < *expires_at => return Err(last_error.clone()),
                TwoStatePhase::Open { .. } => true,
            };

            if expired {
                Some(inner.transition(self.core.kind, |_| TwoStatePhase::Closed))
            } else {
                None
            }
        };

        if let Some(transition) = transition {
            self.core.announce(transition);
        }
        Ok(())
    }

    async fn record_failure(&self, signal: &FailureSignal<E>) {
        self.core.metrics.record_failure(signal.cost());
        let now = self.core.clock.now();

        let transition: Option<Transition> = {
            let mut inner = self.core.inner.write().await;
            if inner.phase.state() != CircuitState::Closed {
                // already tripped by a concurrent call
                return;
            }

            if !inner.decider.should_trip(signal.cost(), now) {
                debug!(
                    breaker = %self.core.name,
                    cost = signal.cost(),
                    "Counted failure within budget"
                );
                return;
            }

            let last_error = signal.cause().clone();
            let expires_at = self.core.open_until(now);
            Some(inner.transition(self.core.kind, move |_| TwoStatePhase::Open {
                last_error,
                expires_at,
            }))
        };

        if let Some(transition) = transition {
            self.core.announce(transition);
        }
    }
}
