use super::three_state::ThreeStateBreaker;
use super::types::{CircuitBreakerMetrics, CircuitState};
use crate::clock::{Clock, SystemClock};
use crate::config::BreakerConfig;
use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Lazily created three-state breakers, one per downstream name, all built
/// from the same template configuration.
#[derive(Debug)]
pub struct BreakerRegistry<E> {
    breakers: Arc<DashMap<String, Arc<ThreeStateBreaker<E>>>>,
    /// Template applied to every breaker; its name is replaced
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl<E> Clone for BreakerRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            breakers: Arc::clone(&self.breakers),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<E: Clone> BreakerRegistry<E> {
    pub fn new(config: BreakerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a registry whose breakers all read time from `clock`
    pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            breakers: Arc::new(DashMap::new()),
            config,
            clock,
        })
    }

    /// Get or create the breaker guarding `name`
    pub fn breaker(&self, name: &str) -> Result<Arc<ThreeStateBreaker<E>>> {
        if let Some(breaker) = self.breakers.get(name) {
            return Ok(Arc::clone(breaker.value()));
        }

        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(existing) => Ok(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                debug!(breaker = name, "Creating new circuit breaker");
                let config = BreakerConfig {
                    name: name.to_string(),
                    ..self.config.clone()
                };
                let breaker = config
                    .builder()?
                    .shared_clock(Arc::clone(&self.clock))
                    .build_three_state()?;
                Ok(Arc::clone(vacant.insert(Arc::new(breaker)).value()))
            }
        }
    }

    /// Get the state of the breaker guarding `name`; unknown names are closed
    pub async fn state(&self, name: &str) -> CircuitState {
        let breaker = self.breakers.get(name).map(|b| Arc::clone(b.value()));
        match breaker {
            Some(breaker) => breaker.state().await,
            None => CircuitState::Closed,
        }
    }

    pub fn metrics(&self, name: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers.get(name).map(|b| b.metrics())
    }

    /// Names of every breaker created so far
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    /// Get metrics and state for all breakers
    pub async fn all_metrics(&self) -> Vec<(String, CircuitBreakerMetrics, CircuitState)> {
        let breakers: Vec<_> = self
            .breakers
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();

        let mut results = Vec::with_capacity(breakers.len());
        for (name, breaker) in breakers {
            let state = breaker.state().await;
            results.push((name, breaker.metrics(), state));
        }
        results
    }
}
