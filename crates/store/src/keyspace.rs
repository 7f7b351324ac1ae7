//! The backing keyspace of the schedule store: per-key atomic get/set/delete,
//! set membership and a cursor scan. The store itself is written against this
//! trait; deployments run on Redis, tests on the in-memory implementation.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;

use crate::{Result, StoreError};

#[async_trait]
pub trait Keyspace: Clone + Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    async fn set_add(&self, key: &str, member: &str) -> Result<()>;
    /// Removing the last member removes the key itself.
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;
    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// All keys matching a glob pattern (`*` wildcards).
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Increments an integer value, starting at 0 for missing keys. Fails
    /// with [`StoreError::CounterOverflow`] once the value cannot grow.
    async fn increment(&self, key: &str) -> Result<i64>;
}

// - Redis -

#[derive(Clone)]
pub struct RedisKeyspace {
    connection: redis::aio::MultiplexedConnection,
}

impl RedisKeyspace {
    /// Connects to a `redis://host:port/database` endpoint.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(backend_error)?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(backend_error)?;
        Ok(Self { connection })
    }
}

fn backend_error(why: redis::RedisError) -> StoreError {
    StoreError::Backend(why.to_string())
}

fn increment_error(why: redis::RedisError) -> StoreError {
    // INCR refuses to wrap; surface that as the dedicated variant so the
    // statistics layer can reset the counter.
    let message = why.to_string();
    if why.kind() == redis::ErrorKind::ResponseError && message.contains("overflow") {
        StoreError::CounterOverflow
    } else {
        backend_error(why)
    }
}

#[async_trait]
impl Keyspace for RedisKeyspace {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        connection.get(key).await.map_err(backend_error)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: () = connection.set(key, value).await.map_err(backend_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: i64 = connection.del(key).await.map_err(backend_error)?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: i64 = connection.sadd(key, member).await.map_err(backend_error)?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: i64 = connection.srem(key, member).await.map_err(backend_error)?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        connection.smembers(key).await.map_err(backend_error)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut connection = self.connection.clone();
        connection.sismember(key, member).await.map_err(backend_error)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut connection = self.connection.clone();
        let mut iterator = connection
            .scan_match::<_, String>(pattern)
            .await
            .map_err(backend_error)?;

        let mut keys = Vec::new();
        while let Some(key) = iterator.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut connection = self.connection.clone();
        redis::cmd("INCR")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(increment_error)
    }
}

// - In-memory -

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Set(HashSet<String>),
}

/// Process-local keyspace used by unit tests and ad-hoc tooling.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyspace {
    entries: Arc<DashMap<String, Value>>,
}

impl MemoryKeyspace {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::Backend(format!("wrong value type at key '{key}'"))
}

#[async_trait]
impl Keyspace for MemoryKeyspace {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entries.get(key).map(|entry| entry.value().clone()) {
            None => Ok(None),
            Some(Value::Text(value)) => Ok(Some(value)),
            Some(Value::Set(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .insert(key.to_owned(), Value::Text(value.to_owned()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Value::Set(HashSet::new()));
        match entry.value_mut() {
            Value::Set(members) => {
                members.insert(member.to_owned());
                Ok(())
            }
            Value::Text(_) => Err(wrong_type(key)),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let emptied = match self.entries.get_mut(key) {
            None => false,
            Some(mut entry) => match entry.value_mut() {
                Value::Set(members) => {
                    members.remove(member);
                    members.is_empty()
                }
                Value::Text(_) => return Err(wrong_type(key)),
            },
        };

        if emptied {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        match self.entries.get(key).map(|entry| entry.value().clone()) {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.into_iter().collect()),
            Some(Value::Text(_)) => Err(wrong_type(key)),
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        match self.entries.get(key) {
            None => Ok(false),
            Some(entry) => match entry.value() {
                Value::Set(members) => Ok(members.contains(member)),
                Value::Text(_) => Err(wrong_type(key)),
            },
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| glob_match(pattern, key))
            .collect())
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let mut entry = self
            .entries
            .entry(key.to_owned())
            .or_insert_with(|| Value::Text("0".to_owned()));
        match entry.value_mut() {
            Value::Text(value) => {
                let current: i64 = value.parse().unwrap_or(0);
                if current == i64::MAX {
                    return Err(StoreError::CounterOverflow);
                }
                let next = current + 1;
                *value = next.to_string();
                Ok(next)
            }
            Value::Set(_) => Err(wrong_type(key)),
        }
    }
}

/// Minimal glob matching: `*` matches any (possibly empty) substring.
fn glob_match(pattern: &str, value: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }

    if !value.starts_with(parts[0]) {
        return false;
    }
    let mut position = parts[0].len();

    for part in &parts[1..parts.len() - 1] {
        match value[position..].find(part) {
            Some(found) => position += found + part.len(),
            None => return false,
        }
    }

    let last = parts[parts.len() - 1];
    value.len() >= position + last.len() && value[position..].ends_with(last)
}
