use async_trait::async_trait;
use quiz_core::model::{TopicId, UserId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Local cache slot holding the serialized `{ topicId: record }` progress map.
pub const PROGRESS_KEY: &str = "userProgress";

/// Local cache slot remembering the last topic picked from the catalog.
pub const CURRENT_TOPIC_KEY: &str = "currentTopic";

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("remote store answered with status {0}")]
    Status(u16),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Path of one score document: `users/{userId}/scores/{topicId}`.
#[must_use]
pub fn score_path(user: &UserId, topic: &TopicId) -> String {
    format!("{}/{topic}", scores_prefix(user))
}

/// Path of the collection holding every score document of a user.
#[must_use]
pub fn scores_prefix(user: &UserId) -> String {
    format!("users/{user}/scores")
}

//
// ─── LOCAL CACHE ───────────────────────────────────────────────────────────────
//

/// Synchronous string-keyed slots local to this profile.
///
/// Reads and writes never fail from the caller's point of view; adapters log
/// their own IO problems and degrade to "missing" on read.
pub trait LocalCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);

    fn remove(&self, key: &str);
}

/// Process-local cache, used in tests and when no cache file is configured.
#[derive(Clone, Default)]
pub struct MemoryCache {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        match self.slots.lock() {
            Ok(guard) => guard.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn set(&self, key: &str, value: String) {
        match self.slots.lock() {
            Ok(mut guard) => guard.insert(key.to_owned(), value),
            Err(poisoned) => poisoned.into_inner().insert(key.to_owned(), value),
        };
    }

    fn remove(&self, key: &str) {
        match self.slots.lock() {
            Ok(mut guard) => guard.remove(key),
            Err(poisoned) => poisoned.into_inner().remove(key),
        };
    }
}

//
// ─── REMOTE SCORES ─────────────────────────────────────────────────────────────
//

/// Per-user score documents held by a remote document service.
///
/// Documents are returned raw; validating them is the caller's job.
#[async_trait]
pub trait RemoteScoreStore: Send + Sync {
    /// Read one score document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the remote cannot be reached or answers with an error.
    async fn read_score(&self, user: &UserId, topic: &TopicId)
    -> Result<Option<Value>, StorageError>;

    /// Read every score document of a user, keyed by the raw topic key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the remote cannot be reached or answers with an error.
    async fn read_scores(&self, user: &UserId) -> Result<BTreeMap<String, Value>, StorageError>;

    /// Replace a score document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write is not acknowledged.
    async fn write_score(
        &self,
        user: &UserId,
        topic: &TopicId,
        document: &Value,
    ) -> Result<(), StorageError>;

    /// Remove a score document; removing a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete is not acknowledged.
    async fn delete_score(&self, user: &UserId, topic: &TopicId) -> Result<(), StorageError>;
}

/// Document store kept in memory, keyed by full path.
#[derive(Clone, Default)]
pub struct InMemoryRemoteStore {
    documents: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl InMemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document at an arbitrary path, bypassing any validation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, path: impl Into<String>, document: Value) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(path.into(), document);
        Ok(())
    }

    /// Snapshot of every stored document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn documents(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl RemoteScoreStore for InMemoryRemoteStore {
    async fn read_score(
        &self,
        user: &UserId,
        topic: &TopicId,
    ) -> Result<Option<Value>, StorageError> {
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&score_path(user, topic)).cloned())
    }

    async fn read_scores(&self, user: &UserId) -> Result<BTreeMap<String, Value>, StorageError> {
        let prefix = format!("{}/", scores_prefix(user));
        let guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .range(prefix.clone()..)
            .map_while(|(path, doc)| path.strip_prefix(&prefix).map(|key| (key, doc)))
            .filter(|(key, _)| !key.contains('/'))
            .map(|(key, doc)| (key.to_owned(), doc.clone()))
            .collect())
    }

    async fn write_score(
        &self,
        user: &UserId,
        topic: &TopicId,
        document: &Value,
    ) -> Result<(), StorageError> {
        self.insert_raw(score_path(user, topic), document.clone())
    }

    async fn delete_score(&self, user: &UserId, topic: &TopicId) -> Result<(), StorageError> {
        let mut guard = self
            .documents
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&score_path(user, topic));
        Ok(())
    }
}

//
// ─── STORAGE ───────────────────────────────────────────────────────────────────
//

/// Local cache plus optional remote store, behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub cache: Arc<dyn LocalCache>,
    pub remote: Option<Arc<dyn RemoteScoreStore>>,
}

impl Storage {
    #[must_use]
    pub fn new(cache: Arc<dyn LocalCache>) -> Self {
        Self {
            cache,
            remote: None,
        }
    }

    /// In-memory cache and remote, for tests and prototyping.
    #[must_use]
    pub fn in_memory() -> Self {
        let remote: Arc<dyn RemoteScoreStore> = Arc::new(InMemoryRemoteStore::new());
        Self::new(Arc::new(MemoryCache::new())).with_remote(remote)
    }

    #[must_use]
    pub fn with_remote(mut self, remote: Arc<dyn RemoteScoreStore>) -> Self {
        self.remote = Some(remote);
        self
    }
}
