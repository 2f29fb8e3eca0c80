//! Time-based budgets used to decide when a breaker trips.

pub mod token_bucket;
pub mod types;

pub use token_bucket::TokenBucket;
pub use types::TokenBucketConfig;
