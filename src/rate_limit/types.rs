use serde::{Deserialize, Serialize};

use crate::error::{BreakerError, Result};

/// Token bucket configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens the bucket can hold
    pub capacity: u64,
    /// Tokens added per second, fractions allowed
    pub refill_per_second: f64,
    /// Tokens available on first use
    #[serde(default)]
    pub initial_tokens: u64,
}

impl TokenBucketConfig {
    /// A bucket that starts full
    pub fn full(capacity: u64, refill_per_second: f64) -> Self {
        Self {
            capacity,
            refill_per_second,
            initial_tokens: capacity,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(BreakerError::config("Token bucket capacity must be > 0"));
        }
        if !self.refill_per_second.is_finite() || self.refill_per_second < 0.0 {
            return Err(BreakerError::Config(format!(
                "Token bucket refill rate must be a finite, non-negative number, got {}",
                self.refill_per_second
            )));
        }
        if self.initial_tokens > self.capacity {
            return Err(BreakerError::Config(format!(
                "Token bucket initial tokens ({}) cannot exceed capacity ({})",
                self.initial_tokens, self.capacity
            )));
        }
        Ok(())
    }
}
