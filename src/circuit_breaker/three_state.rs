use super::shared::{BreakerCore, CoreParts, Phase};
use super::sampler::HalfOpenSampler;
use super::types::{BreakerKind, CircuitBreakerMetrics, CircuitState};
use crate::tripping::{CallError, FailureClassifier, FailureSignal, TransportClassifier};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
enum ThreeStatePhase<E> {
    Closed,
    Open {
        last_error: E,
        expires_at: Instant,
    },
    HalfOpen {
        last_error: E,
        /// Distinguishes half-open phases that may share an entry instant
        epoch: u64,
        entered_at: Instant,
        successes: u32,
    },
}

impl<E> Default for ThreeStatePhase<E> {
    fn default() -> Self {
        ThreeStatePhase::Closed
    }
}

impl<E> Phase for ThreeStatePhase<E> {
    fn state(&self) -> CircuitState {
        match self {
            ThreeStatePhase::Closed => CircuitState::Closed,
            ThreeStatePhase::Open { .. } => CircuitState::Open,
            ThreeStatePhase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl<E> ThreeStatePhase<E> {
    fn into_half_open(self, epoch: u64, now: Instant) -> Self {
        match self {
            ThreeStatePhase::Open { last_error, .. } => ThreeStatePhase::HalfOpen {
                last_error,
                epoch,
                entered_at: now,
                successes: 0,
            },
            other => other,
        }
    }
}

/// What a caller observed about the breaker before deciding whether to run
enum View<E> {
    Closed,
    Rejected(E),
    HalfOpen {
        last_error: E,
        epoch: u64,
        entered_at: Instant,
    },
}

/// How a call was let through
#[derive(Debug, Clone, Copy)]
enum Admission {
    Closed,
    /// A sampled trial call in half-open phase `epoch`
    Probe { epoch: u64 },
}

/// Circuit breaker with Closed, Open and HalfOpen states.
///
/// After the open duration ends the breaker moves to HalfOpen, where the
/// configured [`HalfOpenSampler`] picks which calls are attempted and the
/// rest fail fast. `successes_to_close` successful trial calls close the
/// breaker; a single counted failure sends it straight back to Open.
///
/// Build one with [`CircuitBreakerBuilder`](super::CircuitBreakerBuilder).
#[derive(Debug)]
pub struct ThreeStateBreaker<E> {
    core: BreakerCore<ThreeStatePhase<E>>,
    sampler: Box<dyn HalfOpenSampler>,
    successes_to_close: u32,
    half_open_epochs: AtomicU64,
}

impl<E: Clone> ThreeStateBreaker<E> {
    pub(crate) fn from_parts(
        parts: CoreParts,
        sampler: Box<dyn HalfOpenSampler>,
        successes_to_close: u32,
    ) -> Self {
        debug!(
            breaker = %parts.name,
            sampler = ?sampler,
            successes_to_close,
            "Configuring half-open recovery"
        );

        Self {
            core: BreakerCore::new(parts, BreakerKind::ThreeState),
            sampler,
            successes_to_close,
            half_open_epochs: AtomicU64::new(0),
        }
    }

    /// Run `operation` if the breaker lets it through.
    ///
    /// Closed breakers run every call. Open breakers return the error that
    /// tripped them without running `operation`. Half-open breakers run only
    /// the calls the sampler picks and fail the rest fast.
    ///
    /// Only [`CallError::Counted`] failures move the breaker. The error is
    /// unwrapped before it is returned. `operation` runs without any lock
    /// held.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError<E>>>,
    {
        self.core.metrics.record_call();

        let admission = match self.admit().await {
            Ok(admission) => admission,
            Err((state, cause)) => {
                self.core.metrics.record_rejection(state);
                return Err(cause);
            }
        };

        match operation().await {
            Ok(value) => {
                self.core.metrics.record_success();
                self.record_success(admission).await;
                Ok(value)
            }
            Err(CallError::Uncounted(cause)) => {
                self.core.metrics.record_uncounted();
                self.record_success(admission).await;
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

    /// Successful trial calls recorded in the current half-open phase
    pub async fn half_open_successes(&self) -> Option<u32> {
        match &self.core.inner.read().await.phase {
            ThreeStatePhase::HalfOpen { successes, .. } => Some(*successes),
            _ => None,
        }
    }

    /// Get metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.core.metrics.snapshot()
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    fn view(phase: &ThreeStatePhase<E>, now: Instant) -> Option<View<E>> {
        match phase {
            ThreeStatePhase::Closed => Some(View::Closed),
            ThreeStatePhase::Open {
                last_error,
                expires_at,
            } => {
                if now < *expires_at {
                    Some(View::Rejected(last_error.clone()))
                } else {
                    None
                }
            }
            ThreeStatePhase::HalfOpen {
                last_error,
                epoch,
                entered_at,
                ..
            } => Some(View::HalfOpen {
                last_error: last_error.clone(),
                epoch: *epoch,
                entered_at: *entered_at,
            }),
        }
    }

    async fn admit(&self) -> Result<Admission, (CircuitState, E)> {
        let now = self.core.clock.now();

        let observed = Self::view(&self.core.inner.read().await.phase, now);
        let view = match observed {
            Some(view) => view,
            None => self.enter_half_open(now).await,
        };

        match view {
            View::Closed => Ok(Admission::Closed),
            View::Rejected(cause) => {
                debug!(breaker = %self.core.name, "Circuit breaker open, rejecting call");
                Err((CircuitState::Open, cause))
            }
            View::HalfOpen {
                last_error,
                epoch,
                entered_at,
            } => {
                let elapsed = now.saturating_duration_since(entered_at);
                if self.sampler.should_sample(elapsed) {
                    debug!(
                        breaker = %self.core.name,
                        elapsed = ?elapsed,
                        "Allowing half-open probe call"
                    );
                    Ok(Admission::Probe { epoch })
                } else {
                    debug!(
                        breaker = %self.core.name,
                        elapsed = ?elapsed,
                        "Half-open call not sampled, rejecting"
                    );
                    Err((CircuitState::HalfOpen, last_error))
                }
            }
        }
    }

    /// Move an expired Open breaker to HalfOpen. Exactly one of any number of
    /// racing callers performs the transition; the rest see its result.
    async fn enter_half_open(&self, now: Instant) -> View<E> {
        let (view, transition) = {
            let mut inner = self.core.inner.write().await;
            match Self::view(&inner.phase, now) {
                Some(view) => (view, None),
                None => {
                    // only ever bumped under the write lock
                    let epoch = self.half_open_epochs.fetch_add(1, Ordering::Relaxed);
                    let transition = inner.transition(self.core.kind, |phase| {
                        phase.into_half_open(epoch, now)
                    });
                    let view = Self::view(&inner.phase, now).unwrap_or(View::Closed);
                    (view, Some(transition))
                }
            }
        };

        if let Some(transition) = transition {
            self.core.announce(transition);
        }
        view
    }

    async fn record_success(&self, admission: Admission) {
        let probe_epoch = match admission {
            Admission::Closed => {
                self.core.observe_closed_success().await;
                return;
            }
            Admission::Probe { epoch } => epoch,
        };

        let transition = {
            let mut inner = self.core.inner.write().await;
            // only count probes belonging to the half-open phase still in progress
            let successes = match &mut inner.phase {
                ThreeStatePhase::HalfOpen {
                    epoch, successes, ..
                } if *epoch == probe_epoch => {
                    *successes += 1;
                    *successes
                }
                _ => return,
            };

            debug!(
                breaker = %self.core.name,
                successes,
                threshold = self.successes_to_close,
                "Half-open probe call succeeded"
            );

            if successes >= self.successes_to_close {
                Some(inner.transition(self.core.kind, |_| ThreeStatePhase::Closed))
            } else {
                None
            }
        };

        if let Some(transition) = transition {
            self.core.announce(transition);
        }
    }

    async fn record_failure(&self, signal: &FailureSignal<E>) {
        self.core.metrics.record_failure(signal.cost());
        let now = self.core.clock.now();

        let transition = {
            let mut inner = self.core.inner.write().await;
            let trip = match inner.phase.state() {
                CircuitState::Closed => {
                    let trip = inner.decider.should_trip(signal.cost(), now);
                    if !trip {
                        debug!(
                            breaker = %self.core.name,
                            cost = signal.cost(),
                            "Counted failure within budget"
                        );
                    }
                    trip
                }
                CircuitState::HalfOpen => {
                    warn!(
                        breaker = %self.core.name,
                        "Half-open probe call failed, reopening circuit"
                    );
                    true
                }
                // already tripped by a concurrent call
                CircuitState::Open => false,
            };

            if trip {
                let last_error = signal.cause().clone();
                let expires_at = self.core.open_until(now);
                Some(inner.transition(self.core.kind, move |_| ThreeStatePhase::Open {
                    last_error,
                    expires_at,
                }))
            } else {
                None
            }
        };

        if let Some(transition) = transition {
            self.core.announce(transition);
        }
    }
}
