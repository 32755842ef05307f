//! Persistence sinks
//!
//! The exporter plans a list of [`SinkWrite`]s and hands them to a
//! [`StatsSink`]. Every write replaces its whole dataset, so applying the
//! same plan twice leaves the sink in the same state.

use crate::error::{SinkError, SinkResult};
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Default Redis URL for the statistics store
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6328";

/// One dataset-level write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkWrite {
    /// Replace a list with `values`, in order
    ReplaceList { key: String, values: Vec<String> },

    /// Replace a hash with `fields`
    ReplaceHash {
        key: String,
        fields: Vec<(String, String)>,
    },

    /// Replace a set with `members`
    ReplaceSet { key: String, members: Vec<String> },

    /// Set a string value
    Set { key: String, value: String },
}

impl SinkWrite {
    /// Target key of this write
    pub fn key(&self) -> &str {
        match self {
            SinkWrite::ReplaceList { key, .. } => key,
            SinkWrite::ReplaceHash { key, .. } => key,
            SinkWrite::ReplaceSet { key, .. } => key,
            SinkWrite::Set { key, .. } => key,
        }
    }
}

/// Destination for exported statistics
///
/// Implementations must tolerate concurrent use by several exporters.
#[async_trait::async_trait]
pub trait StatsSink: Send + Sync {
    /// Apply a single write
    async fn apply(&self, write: &SinkWrite) -> SinkResult<()>;
}

/// Redis-backed sink
pub struct RedisSink {
    connection: MultiplexedConnection,
    url: String,
}

impl RedisSink {
    /// Connect to Redis at `url`
    pub async fn connect(url: &str) -> SinkResult<Self> {
        let client = Client::open(url).map_err(|e| SinkError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SinkError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            connection,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl StatsSink for RedisSink {
    async fn apply(&self, write: &SinkWrite) -> SinkResult<()> {
        // MultiplexedConnection is a cheap handle; clones share one socket
        let mut conn = self.connection.clone();

        match write {
            SinkWrite::ReplaceList { key, values } => {
                let mut pipe = redis::pipe();
                pipe.atomic().del(key).ignore();
                if !values.is_empty() {
                    pipe.rpush(key, values).ignore();
                }
                pipe.query_async::<()>(&mut conn).await?;
            }
            SinkWrite::ReplaceHash { key, fields } => {
                let mut pipe = redis::pipe();
                pipe.atomic().del(key).ignore();
                if !fields.is_empty() {
                    pipe.hset_multiple(key, fields.as_slice()).ignore();
                }
                pipe.query_async::<()>(&mut conn).await?;
            }
            SinkWrite::ReplaceSet { key, members } => {
                let mut pipe = redis::pipe();
                pipe.atomic().del(key).ignore();
                if !members.is_empty() {
                    pipe.sadd(key, members).ignore();
                }
                pipe.query_async::<()>(&mut conn).await?;
            }
            SinkWrite::Set { key, value } => {
                conn.set::<_, _, ()>(key, value).await?;
            }
        }

        Ok(())
    }
}

/// Contents of a [`MemorySink`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    pub lists: HashMap<String, Vec<String>>,
    pub hashes: HashMap<String, BTreeMap<String, String>>,
    pub sets: HashMap<String, BTreeSet<String>>,
    pub strings: HashMap<String, String>,
}

/// In-process sink, used by tests and for printing reports locally
#[derive(Debug, Default)]
pub struct MemorySink {
    store: Mutex<MemoryStore>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn snapshot(&self) -> MemoryStore {
        self.store.lock().clone()
    }

    /// Value of a string key
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.lock().strings.get(key).cloned()
    }

    /// Contents of a list key
    pub fn list(&self, key: &str) -> Vec<String> {
        self.store.lock().lists.get(key).cloned().unwrap_or_default()
    }

    /// Contents of a hash key
    pub fn hash(&self, key: &str) -> BTreeMap<String, String> {
        self.store.lock().hashes.get(key).cloned().unwrap_or_default()
    }

    /// Members of a set key
    pub fn set_members(&self, key: &str) -> BTreeSet<String> {
        self.store.lock().sets.get(key).cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl StatsSink for MemorySink {
    async fn apply(&self, write: &SinkWrite) -> SinkResult<()> {
        let mut store = self.store.lock();
        match write {
            SinkWrite::ReplaceList { key, values } => {
                store.lists.insert(key.clone(), values.clone());
            }
            SinkWrite::ReplaceHash { key, fields } => {
                store
                    .hashes
                    .insert(key.clone(), fields.iter().cloned().collect());
            }
            SinkWrite::ReplaceSet { key, members } => {
                store
                    .sets
                    .insert(key.clone(), members.iter().cloned().collect());
            }
            SinkWrite::Set { key, value } => {
                store.strings.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

/// Sink that fails on its `fail_at`-th write (1-based) and records the
/// keys of every write it was asked to apply
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingSink {
    fail_at: usize,
    attempted: Mutex<Vec<String>>,
    inner: MemorySink,
}

#[cfg(test)]
impl FailingSink {
    pub(crate) fn new(fail_at: usize) -> Self {
        Self {
            fail_at,
            ..Default::default()
        }
    }

    /// Keys of all writes attempted, including the failing one
    pub(crate) fn attempted(&self) -> Vec<String> {
        self.attempted.lock().clone()
    }

    pub(crate) fn store(&self) -> MemoryStore {
        self.inner.snapshot()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl StatsSink for FailingSink {
    async fn apply(&self, write: &SinkWrite) -> SinkResult<()> {
        let attempt = {
            let mut attempted = self.attempted.lock();
            attempted.push(write.key().to_string());
            attempted.len()
        };
        if attempt == self.fail_at {
            return Err(SinkError::Redis("READONLY You can't write against a read only replica".into()));
        }
        self.inner.apply(write).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_replaces_lists() {
        let sink = MemorySink::new();
        let write = |values: &[&str]| SinkWrite::ReplaceList {
            key: "i:list".into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        };

        sink.apply(&write(&["a", "b"])).await.unwrap();
        sink.apply(&write(&["c"])).await.unwrap();
        assert_eq!(sink.list("i:list"), vec!["c"]);
    }

    #[tokio::test]
    async fn test_memory_sink_hash_and_set() {
        let sink = MemorySink::new();
        sink.apply(&SinkWrite::ReplaceHash {
            key: "h".into(),
            fields: vec![("f".into(), "v".into())],
        })
        .await
        .unwrap();
        sink.apply(&SinkWrite::ReplaceSet {
            key: "s".into(),
            members: vec!["x".into(), "x".into(), "y".into()],
        })
        .await
        .unwrap();

        assert_eq!(sink.hash("h").get("f").map(String::as_str), Some("v"));
        assert_eq!(sink.set_members("s").len(), 2);
    }

    #[tokio::test]
    async fn test_failing_sink_fails_once_at_position() {
        let sink = FailingSink::new(2);
        let write = |key: &str| SinkWrite::Set {
            key: key.into(),
            value: "1".into(),
        };

        assert!(sink.apply(&write("a")).await.is_ok());
        assert!(matches!(sink.apply(&write("b")).await, Err(SinkError::Redis(_))));
        assert_eq!(sink.attempted(), vec!["a", "b"]);
        assert!(sink.store().strings.contains_key("a"));
        assert!(!sink.store().strings.contains_key("b"));
    }

    #[test]
    fn test_redis_error_maps_to_sink_error() {
        let err: SinkError = redis::RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE")).into();
        assert!(matches!(err, SinkError::Redis(ref msg) if msg.contains("WRONGTYPE")));
    }

    #[tokio::test]
    async fn test_redis_connect_rejects_bad_url() {
        let result = RedisSink::connect("not-a-redis-url").await;
        assert!(matches!(result, Err(SinkError::ConnectionFailed { .. })));
    }

    #[test]
    fn test_write_key() {
        let write = SinkWrite::Set {
            key: "i:TotalBytesAndNum".into(),
            value: "{}".into(),
        };
        assert_eq!(write.key(), "i:TotalBytesAndNum");
    }
}
