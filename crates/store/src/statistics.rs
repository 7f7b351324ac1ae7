//! Counters for processed messages and services. The backing counters are
//! 64-bit; an increment that would overflow wraps the counter back to 0.

use utility::time::parse_str_int;

use crate::{keyspace::Keyspace, Result, StoreError};

pub const MESSAGES_COUNTER: &str = "stats:messages";
pub const SERVICES_COUNTER: &str = "stats:services";

#[derive(Debug, Clone)]
pub struct Statistics<K: Keyspace> {
    keyspace: K,
}

impl<K: Keyspace> Statistics<K> {
    pub fn new(keyspace: K) -> Self {
        Self { keyspace }
    }

    pub async fn processed_messages(&self) -> Result<i64> {
        self.counter(MESSAGES_COUNTER).await
    }

    pub async fn processed_services(&self) -> Result<i64> {
        self.counter(SERVICES_COUNTER).await
    }

    pub async fn increment_processed_messages(&self) -> Result<i64> {
        self.increment(MESSAGES_COUNTER).await
    }

    pub async fn increment_processed_services(&self) -> Result<i64> {
        self.increment(SERVICES_COUNTER).await
    }

    pub async fn reset_counters(&self) -> Result<()> {
        self.keyspace.remove(MESSAGES_COUNTER).await?;
        self.keyspace.remove(SERVICES_COUNTER).await?;
        Ok(())
    }

    async fn counter(&self, key: &str) -> Result<i64> {
        Ok(self
            .keyspace
            .get(key)
            .await?
            .map(|value| parse_str_int(&value))
            .unwrap_or(0))
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        match self.keyspace.increment(key).await {
            Ok(value) => Ok(value),
            Err(StoreError::CounterOverflow) => {
                self.keyspace.set(key, "0").await?;
                Ok(0)
            }
            Err(why) => Err(why),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::MemoryKeyspace;

    #[tokio::test]
    async fn counters_start_at_zero() {
        let statistics = Statistics::new(MemoryKeyspace::new());

        assert_eq!(statistics.processed_messages().await.unwrap(), 0);
        assert_eq!(statistics.increment_processed_messages().await.unwrap(), 1);
        assert_eq!(statistics.increment_processed_services().await.unwrap(), 1);
        assert_eq!(statistics.processed_messages().await.unwrap(), 1);
        assert_eq!(statistics.processed_services().await.unwrap(), 1);

        statistics.reset_counters().await.unwrap();
        assert_eq!(statistics.processed_messages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counter_wraps_at_the_64_bit_maximum() {
        let keyspace = MemoryKeyspace::new();
        let statistics = Statistics::new(keyspace.clone());

        keyspace
            .set(MESSAGES_COUNTER, &(i64::MAX - 1).to_string())
            .await
            .unwrap();

        assert_eq!(
            statistics.increment_processed_messages().await.unwrap(),
            i64::MAX
        );
        assert_eq!(statistics.increment_processed_messages().await.unwrap(), 0);
        assert_eq!(statistics.processed_messages().await.unwrap(), 0);
    }
}
