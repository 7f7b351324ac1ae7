use std::{error, fmt, result};

pub mod keyspace;
pub mod service_store;
pub mod statistics;

pub use keyspace::{Keyspace, MemoryKeyspace, RedisKeyspace};
pub use service_store::{ServiceStore, ServiceSummary, StoreTier, TierSelector};
pub use statistics::Statistics;

#[derive(Debug)]
pub enum StoreError {
    /// Backing store connectivity or protocol failure.
    Backend(String),
    /// A counter reached the 64-bit maximum.
    CounterOverflow,
    Serialization(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(why) => write!(f, "schedule store error: {why}"),
            StoreError::CounterOverflow => write!(f, "counter would overflow"),
            StoreError::Serialization(why) => write!(f, "cannot encode service: {why}"),
        }
    }
}

impl error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(why: serde_json::Error) -> Self {
        StoreError::Serialization(why)
    }
}

pub type Result<T> = result::Result<T, StoreError>;
