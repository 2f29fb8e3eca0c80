use crate::circuit_breaker::{CircuitBreakerBuilder, LinearScalingSampler};
use crate::error::{BreakerError, Result};
use crate::rate_limit::TokenBucketConfig;
use crate::tripping::{AlwaysTrip, ConsecutiveFailures, SlidingWindow, TokenBucketDecider, TripDecider};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Declarative breaker configuration, usually loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Name used in logs, metrics labels and notifications
    #[serde(default = "default_name")]
    pub name: String,
    /// How long a tripped breaker fails fast, in milliseconds
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,
    /// Successful trial calls needed to close a half-open breaker
    #[serde(default = "default_successes_to_close")]
    pub successes_to_close: u32,
    /// Policy deciding when counted failures trip the breaker
    pub trip: TripConfig,
    /// Half-open sampling; every half-open call is attempted when absent
    #[serde(default)]
    pub half_open: Option<SamplerConfig>,
}

/// Trip policy selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum TripConfig {
    /// Trip once failures exhaust a refilling token budget
    TokenBucket(TokenBucketConfig),
    /// Trip after `threshold` counted failures in a row
    ConsecutiveFailures { threshold: u64 },
    /// Trip once `threshold` failures land within `window_ms`
    SlidingWindow { threshold: u64, window_ms: u64 },
    /// Trip on the first counted failure
    Always,
}

/// Linear half-open sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Time over which the sampling chance ramps up, in milliseconds
    pub scale_over_ms: u64,
    /// Sampling chance reached at the end of the ramp
    #[serde(default = "default_max_chance")]
    pub max_chance: f64,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_open_duration_ms() -> u64 {
    60_000
}

fn default_successes_to_close() -> u32 {
    1
}

fn default_max_chance() -> f64 {
    1.0
}

impl BreakerConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BreakerError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BreakerError::config("Breaker name cannot be empty"));
        }

        if self.successes_to_close == 0 {
            return Err(BreakerError::Config(format!(
                "Breaker '{}': successes_to_close must be at least 1",
                self.name
            )));
        }

        match &self.trip {
            TripConfig::TokenBucket(bucket) => bucket.validate()?,
            TripConfig::ConsecutiveFailures { threshold }
            | TripConfig::SlidingWindow { threshold, .. }
                if *threshold == 0 =>
            {
                return Err(BreakerError::Config(format!(
                    "Breaker '{}': failure threshold must be > 0",
                    self.name
                )));
            }
            TripConfig::SlidingWindow { window_ms: 0, .. } => {
                return Err(BreakerError::Config(format!(
                    "Breaker '{}': sliding window must be > 0ms",
                    self.name
                )));
            }
            _ => {}
        }

        if let Some(sampler) = &self.half_open {
            if sampler.scale_over_ms == 0 {
                return Err(BreakerError::Config(format!(
                    "Breaker '{}': half-open scale_over_ms must be > 0",
                    self.name
                )));
            }
            if !(0.0..=1.0).contains(&sampler.max_chance) {
                return Err(BreakerError::Config(format!(
                    "Breaker '{}': half-open max_chance must be within [0, 1], got {}",
                    self.name, sampler.max_chance
                )));
            }
        }

        Ok(())
    }

    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_duration_ms)
    }

    /// Build a fresh decider for the configured policy
    pub fn trip_decider(&self) -> Box<dyn TripDecider> {
        match &self.trip {
            TripConfig::TokenBucket(bucket) => Box::new(TokenBucketDecider::new(bucket)),
            TripConfig::ConsecutiveFailures { threshold } => {
                Box::new(ConsecutiveFailures::new(*threshold))
            }
            TripConfig::SlidingWindow {
                threshold,
                window_ms,
            } => Box::new(SlidingWindow::new(
                *threshold,
                Duration::from_millis(*window_ms),
            )),
            TripConfig::Always => Box::new(AlwaysTrip),
        }
    }

    /// Validate and turn the configuration into a builder.
    ///
    /// The builder still accepts a clock and a state change receiver before
    /// a two- or three-state breaker is built from it. A two-state build
    /// rejects configurations carrying half-open settings.
    pub fn builder(&self) -> Result<CircuitBreakerBuilder> {
        self.validate()?;

        let mut builder = CircuitBreakerBuilder::new(self.name.clone())
            .open_duration(self.open_duration())
            .boxed_trip_decider(self.trip_decider());

        if self.successes_to_close != default_successes_to_close() {
            builder = builder.successes_to_close(self.successes_to_close);
        }
        if let Some(sampler) = &self.half_open {
            builder = builder.half_open_sampler(LinearScalingSampler::new(
                Duration::from_millis(sampler.scale_over_ms),
                sampler.max_chance,
            ));
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use std::io::Write;

    #[test]
    fn test_parse_token_bucket_config() {
        let yaml = r#"
name: "payments"
open_duration_ms: 5000
successes_to_close: 3
trip:
  policy: token_bucket
  capacity: 10
  refill_per_second: 0.5
  initial_tokens: 4
half_open:
  scale_over_ms: 30000
  max_chance: 0.25
"#;

        let config = BreakerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "payments");
        assert_eq!(config.open_duration(), Duration::from_secs(5));
        assert_eq!(config.successes_to_close, 3);
        assert_eq!(
            config.trip,
            TripConfig::TokenBucket(TokenBucketConfig {
                capacity: 10,
                refill_per_second: 0.5,
                initial_tokens: 4,
            })
        );
        assert_eq!(
            config.half_open,
            Some(SamplerConfig {
                scale_over_ms: 30_000,
                max_chance: 0.25,
            })
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let yaml = r#"
trip:
  policy: always
"#;

        let config = BreakerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name, "default");
        assert_eq!(config.open_duration_ms, 60_000);
        assert_eq!(config.successes_to_close, 1);
        assert_eq!(config.trip, TripConfig::Always);
        assert!(config.half_open.is_none());
    }

    #[test]
    fn test_parse_counting_policies() {
        let config = BreakerConfig::from_yaml(
            "trip:\n  policy: consecutive_failures\n  threshold: 5\n",
        )
        .unwrap();
        assert_eq!(config.trip, TripConfig::ConsecutiveFailures { threshold: 5 });

        let config = BreakerConfig::from_yaml(
            "trip:\n  policy: sliding_window\n  threshold: 3\n  window_ms: 1000\n",
        )
        .unwrap();
        assert_eq!(
            config.trip,
            TripConfig::SlidingWindow {
                threshold: 3,
                window_ms: 1000,
            }
        );
    }

    #[test]
    fn test_missing_trip_policy_is_rejected() {
        assert!(BreakerConfig::from_yaml("name: backend\n").is_err());
        assert!(BreakerConfig::from_yaml("trip:\n  policy: coin_flip\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = BreakerConfig::from_yaml("trip:\n  policy: always\n").unwrap();
        config.successes_to_close = 0;
        assert!(config.validate().is_err());

        let mut config = BreakerConfig::from_yaml("trip:\n  policy: always\n").unwrap();
        config.trip = TripConfig::ConsecutiveFailures { threshold: 0 };
        assert!(config.validate().is_err());

        config.trip = TripConfig::SlidingWindow {
            threshold: 2,
            window_ms: 0,
        };
        assert!(config.validate().is_err());

        config.trip = TripConfig::TokenBucket(TokenBucketConfig::full(0, 1.0));
        assert!(config.validate().is_err());

        config.trip = TripConfig::Always;
        config.half_open = Some(SamplerConfig {
            scale_over_ms: 1000,
            max_chance: 1.5,
        });
        assert!(config.validate().is_err());

        config.half_open = Some(SamplerConfig {
            scale_over_ms: 0,
            max_chance: 0.5,
        });
        assert!(config.validate().is_err());

        config.half_open = None;
        config.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: inventory").unwrap();
        writeln!(file, "trip:").unwrap();
        writeln!(file, "  policy: consecutive_failures").unwrap();
        writeln!(file, "  threshold: 2").unwrap();

        let config = BreakerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.name, "inventory");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_missing_file() {
        let err = BreakerConfig::from_file("/nonexistent/breaker.yaml").unwrap_err();
        assert!(matches!(err, BreakerError::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }

    #[tokio::test]
    async fn test_builder_from_config() {
        let config = BreakerConfig::from_yaml("name: search\ntrip:\n  policy: always\n").unwrap();

        let two_state = config.builder().unwrap().build_two_state::<String>().unwrap();
        assert_eq!(two_state.name(), "search");
        let _ = two_state
            .execute(|| async { Err::<(), _>("down".to_string()) })
            .await;
        assert_eq!(two_state.state().await, CircuitState::Open);

        let three_state = config.builder().unwrap().build_three_state::<String>().unwrap();
        assert_eq!(three_state.state().await, CircuitState::Closed);
    }

    #[test]
    fn test_half_open_config_requires_three_states() {
        let config = BreakerConfig::from_yaml(
            "trip:\n  policy: always\nhalf_open:\n  scale_over_ms: 1000\n",
        )
        .unwrap();
        assert!(config.builder().unwrap().build_two_state::<String>().is_err());
        assert!(config.builder().unwrap().build_three_state::<String>().is_ok());
    }
}
