pub mod refill;
pub mod token_bucket;

pub use refill::{RefillError, TokenRefiller};
pub use token_bucket::{TokenBucket, DEFAULT_CAPACITY, DEFAULT_REFILL_INTERVAL};
