use super::notifier::StateChangeNotifier;
use super::types::{BreakerKind, CircuitState};
use crate::clock::Clock;
use crate::metrics::BreakerMetricsRecorder;
use crate::tripping::TripDecider;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

/// Tagged state held by a breaker
pub(crate) trait Phase: Default {
    fn state(&self) -> CircuitState;
}

/// Everything guarded by the breaker's lock
#[derive(Debug)]
pub(crate) struct Inner<P> {
    pub(crate) phase: P,
    pub(crate) decider: Box<dyn TripDecider>,
}

impl<P: Phase> Inner<P> {
    /// Move to the phase built by `next` and return the notification to send
    /// once the lock has been released.
    pub(crate) fn transition(&mut self, kind: BreakerKind, next: impl FnOnce(P) -> P) -> Transition {
        let from = self.phase.state();
        self.phase = next(std::mem::take(&mut self.phase));
        let to = self.phase.state();
        debug_assert!(kind.allows(from, to), "illegal transition {} -> {}", from, to);

        if to == CircuitState::Closed {
            self.decider.reset();
        }
        Transition { from, to }
    }
}

/// A completed state change whose side effects are still pending
#[must_use = "transitions must be announced after the state lock is released"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// State and collaborators shared by both breaker variants
#[derive(Debug)]
pub(crate) struct BreakerCore<P> {
    pub(crate) name: String,
    pub(crate) kind: BreakerKind,
    pub(crate) open_duration: Duration,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) notifier: StateChangeNotifier,
    pub(crate) metrics: BreakerMetricsRecorder,
    /// Cached from the decider so closed-state successes skip the write lock otherwise
    pub(crate) observes_successes: bool,
    pub(crate) inner: RwLock<Inner<P>>,
}

impl<P: Phase> BreakerCore<P> {
    pub(crate) fn new(parts: CoreParts, kind: BreakerKind) -> Self {
        let observes_successes = parts.decider.observes_successes();
        info!(
            breaker = %parts.name,
            kind = ?kind,
            open_duration = ?parts.open_duration,
            decider = ?parts.decider,
            "Creating circuit breaker"
        );

        Self {
            metrics: BreakerMetricsRecorder::new(&parts.name),
            name: parts.name,
            kind,
            open_duration: parts.open_duration,
            clock: parts.clock,
            notifier: parts.notifier,
            observes_successes,
            inner: RwLock::new(Inner {
                phase: P::default(),
                decider: parts.decider,
            }),
        }
    }

    pub(crate) async fn state(&self) -> CircuitState {
        self.inner.read().await.phase.state()
    }

    /// When a breaker tripping at `now` may be probed again
    pub(crate) fn open_until(&self, now: Instant) -> Instant {
        now.checked_add(self.open_duration)
            .unwrap_or_else(|| now + Duration::from_secs(365 * 24 * 60 * 60))
    }

    /// Feed a closed-state success to deciders that track them
    pub(crate) async fn observe_closed_success(&self) {
        if !self.observes_successes {
            return;
        }
        let now = self.clock.now();
        let mut inner = self.inner.write().await;
        if inner.phase.state() == CircuitState::Closed {
            inner.decider.on_success(now);
        }
    }

    /// Run the side effects of a transition. Must be called without the lock held.
    pub(crate) fn announce(&self, transition: Transition) {
        info!(
            breaker = %self.name,
            from = %transition.from,
            to = %transition.to,
            "Circuit breaker state changed"
        );
        self.metrics.record_transition(transition.from, transition.to);
        self.notifier.notify(&self.name, transition.to);
    }
}

/// Construction inputs produced by the builder
#[derive(Debug)]
pub(crate) struct CoreParts {
    pub(crate) name: String,
    pub(crate) open_duration: Duration,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) notifier: StateChangeNotifier,
    pub(crate) decider: Box<dyn TripDecider>,
}
