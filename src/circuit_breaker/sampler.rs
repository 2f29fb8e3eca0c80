use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::{self, Debug};
use std::sync::Mutex;
use std::time::Duration;

/// Decides which calls a half-open breaker lets through.
pub trait HalfOpenSampler: Debug + Send + Sync {
    /// `elapsed` is how long the breaker has been half-open
    fn should_sample(&self, elapsed: Duration) -> bool;
}

/// Lets every half-open call through. Used when no sampler is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSample;

impl HalfOpenSampler for AlwaysSample {
    fn should_sample(&self, _elapsed: Duration) -> bool {
        true
    }
}

/// Samples with a probability that grows linearly with time spent half-open.
///
/// The chance starts at zero the moment the breaker becomes half-open and
/// rises to `max_chance` once `scale_over` has elapsed, staying there after.
/// With `scale_over = 30s` and `max_chance = 0.25`, a call made 10s into the
/// half-open phase has roughly an 8% chance of being attempted.
///
/// The random source is owned by the sampler and guarded by its own mutex,
/// so it is never touched while a breaker lock is held.
pub struct LinearScalingSampler<R = StdRng> {
    scale_over: Duration,
    max_chance: f64,
    rng: Mutex<R>,
}

impl LinearScalingSampler<StdRng> {
    /// Sampler seeded from the operating system's entropy source
    pub fn new(scale_over: Duration, max_chance: f64) -> Self {
        Self::with_rng(scale_over, max_chance, StdRng::from_entropy())
    }
}

impl<R: Rng + Send> LinearScalingSampler<R> {
    /// Sampler drawing from `rng`. `max_chance` is clamped into `[0, 1]`.
    pub fn with_rng(scale_over: Duration, max_chance: f64, rng: R) -> Self {
        let max_chance = if max_chance.is_nan() {
            0.0
        } else {
            max_chance.clamp(0.0, 1.0)
        };
        Self {
            scale_over,
            max_chance,
            rng: Mutex::new(rng),
        }
    }

    /// Probability that a call made `elapsed` into the half-open phase is attempted
    pub fn probability(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.scale_over {
            return self.max_chance;
        }
        elapsed.as_secs_f64() / self.scale_over.as_secs_f64() * self.max_chance
    }

    fn draw(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen::<f64>()
    }
}

impl<R: Rng + Send> HalfOpenSampler for LinearScalingSampler<R> {
    fn should_sample(&self, elapsed: Duration) -> bool {
        self.draw() < self.probability(elapsed)
    }
}

impl<R> Debug for LinearScalingSampler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinearScalingSampler")
            .field("scale_over", &self.scale_over)
            .field("max_chance", &self.max_chance)
            .finish_non_exhaustive()
    }
}
