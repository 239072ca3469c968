use std::future::Future;
use std::sync::Arc;

use quiz_core::model::{
    Catalog, ProgressMap, ProgressRecord, TopicId, UserId, decode_entries, decode_progress_map,
    encode_progress_map,
};
use quiz_core::reconcile::reconcile;
use quiz_core::stats::{OverallStats, RankedTopic, TopicProgress, overall_stats, rank_topics};
use serde_json::Value;
use storage::repository::{LocalCache, PROGRESS_KEY, RemoteScoreStore, StorageError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::context::UserContext;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// What happened to the remote side during `ProgressStore::load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Nobody signed in, or no remote configured.
    Skipped,
    /// Remote records were read and merged.
    Merged {
        adopted: Vec<TopicId>,
        rejected: usize,
    },
    /// The remote read failed; local progress was used unchanged.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub topics: usize,
    pub remote: RemoteStatus,
}

/// Final state of a best-effort remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteWrite {
    Skipped,
    Written,
    Failed,
}

/// Handle to a remote write running in the background.
///
/// Dropping it detaches the write; its outcome still reaches the log.
#[derive(Debug)]
#[must_use = "drop the handle explicitly to detach the remote write"]
pub struct RemoteSync {
    task: Option<JoinHandle<RemoteWrite>>,
}

impl RemoteSync {
    fn skipped() -> Self {
        Self { task: None }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.task.is_some()
    }

    /// Wait for the remote write to finish.
    pub async fn settled(self) -> RemoteWrite {
        match self.task {
            None => RemoteWrite::Skipped,
            Some(task) => task.await.unwrap_or(RemoteWrite::Failed),
        }
    }
}

//
// ─── PROGRESS STORE ────────────────────────────────────────────────────────────
//

/// Per-topic progress, kept in the local cache and mirrored to the remote store
/// of the signed-in user.
///
/// Local writes always land before any remote operation is issued. Remote
/// failures are logged and never undo local state. Remote operations issued
/// through one store run in the order they were issued.
pub struct ProgressStore {
    catalog: Catalog,
    cache: Arc<dyn LocalCache>,
    context: UserContext,
    progress: ProgressMap,
    // Fires when the most recently issued remote operation has finished.
    remote_tail: Option<oneshot::Receiver<()>>,
}

impl ProgressStore {
    /// Store over `catalog`, seeded from whatever the local cache holds.
    ///
    /// Call `load` to merge in remote records.
    #[must_use]
    pub fn new(catalog: Catalog, cache: Arc<dyn LocalCache>, context: UserContext) -> Self {
        let progress = read_cache(cache.as_ref());
        Self {
            catalog,
            cache,
            context,
            progress,
            remote_tail: None,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn context(&self) -> &UserContext {
        &self.context
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressMap {
        &self.progress
    }

    #[must_use]
    pub fn record(&self, topic: &TopicId) -> Option<&ProgressRecord> {
        self.progress.get(topic)
    }

    /// Merge the local cache with the remote records of the signed-in user and
    /// persist the merged map locally.
    ///
    /// Never fails: a remote read error leaves local progress untouched and is
    /// reported in the outcome.
    pub async fn load(&mut self) -> LoadOutcome {
        let mut local = read_cache(self.cache.as_ref());

        let remote = match self.context.remote() {
            None => RemoteStatus::Skipped,
            Some((user, remote)) => match remote.read_scores(user).await {
                Ok(documents) => {
                    let decoded =
                        decode_entries(documents.iter().map(|(key, doc)| (key.as_str(), doc)));
                    for (key, err) in &decoded.rejected {
                        tracing::warn!(%user, topic = %key, error = %err, "skipping malformed remote progress");
                    }
                    let rejected = decoded.rejected.len();
                    let report = reconcile(&mut local, decoded.records);
                    write_cache(self.cache.as_ref(), &local);
                    tracing::info!(
                        %user,
                        adopted = report.adopted.len(),
                        kept_local = report.kept_local,
                        rejected,
                        "progress reconciled with remote"
                    );
                    RemoteStatus::Merged {
                        adopted: report.adopted,
                        rejected,
                    }
                }
                Err(err) => {
                    tracing::warn!(%user, error = %err, "remote progress unavailable, using local cache");
                    RemoteStatus::Failed(err.to_string())
                }
            },
        };

        self.progress = local;
        LoadOutcome {
            topics: self.progress.len(),
            remote,
        }
    }

    /// Replace the record for `topic` locally, then remotely in the background.
    pub fn record_attempt(&mut self, topic: &TopicId, record: ProgressRecord) -> RemoteSync {
        tracing::info!(
            %topic,
            score = record.score(),
            completed_questions = record.completed_questions(),
            completed = record.completed_at().is_some(),
            "attempt recorded"
        );
        let document = record.to_document();
        self.progress.insert(topic.clone(), record);
        write_cache(self.cache.as_ref(), &self.progress);

        self.sync_remote("write", topic, move |remote, user, topic| async move {
            remote.write_score(&user, &topic, &document).await
        })
    }

    /// Forget `topic` locally and remotely.
    pub fn clear_attempt(&mut self, topic: &TopicId) -> RemoteSync {
        if self.progress.remove(topic).is_some() {
            write_cache(self.cache.as_ref(), &self.progress);
            tracing::info!(%topic, "attempt cleared");
        }

        self.sync_remote("delete", topic, |remote, user, topic| async move {
            remote.delete_score(&user, &topic).await
        })
    }

    /// Progress of one catalog topic; `None` for topics outside the catalog.
    #[must_use]
    pub fn topic_progress(&self, topic: &TopicId) -> Option<TopicProgress> {
        let entry = self.catalog.get(topic)?;
        Some(TopicProgress::for_topic(entry, self.progress.get(topic)))
    }

    /// Every catalog topic, highest percentage first.
    #[must_use]
    pub fn all_topics_progress(&self) -> Vec<RankedTopic<'_>> {
        rank_topics(&self.catalog, &self.progress)
    }

    /// The first `limit` entries of `all_topics_progress`.
    #[must_use]
    pub fn top_topics(&self, limit: usize) -> Vec<RankedTopic<'_>> {
        let mut ranked = self.all_topics_progress();
        ranked.truncate(limit);
        ranked
    }

    #[must_use]
    pub fn overall_stats(&self) -> OverallStats {
        overall_stats(&self.catalog, &self.progress)
    }

    /// Run `call` against the remote in the background, after every remote
    /// operation this store issued before it.
    fn sync_remote<F, Fut>(
        &mut self,
        operation: &'static str,
        topic: &TopicId,
        call: F,
    ) -> RemoteSync
    where
        F: FnOnce(Arc<dyn RemoteScoreStore>, UserId, TopicId) -> Fut,
        Fut: Future<Output = Result<(), StorageError>> + Send + 'static,
    {
        let Some((user, remote)) = self.context.remote() else {
            return RemoteSync::skipped();
        };
        let (user, remote) = (user.clone(), Arc::clone(remote));
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%user, %topic, operation, "no async runtime, remote sync skipped");
            return RemoteSync::skipped();
        };

        let previous = self.remote_tail.take();
        let (done, tail) = oneshot::channel();
        self.remote_tail = Some(tail);

        let (log_user, log_topic) = (user.clone(), topic.clone());
        let pending = call(remote, user, topic.clone());
        let task = runtime.spawn(async move {
            if let Some(previous) = previous {
                // A dropped sender means the earlier task is gone either way.
                let _ = previous.await;
            }
            let outcome = match pending.await {
                Ok(()) => {
                    tracing::debug!(user = %log_user, topic = %log_topic, operation, "remote progress synced");
                    RemoteWrite::Written
                }
                Err(err) => {
                    tracing::warn!(user = %log_user, topic = %log_topic, operation, error = %err, "remote progress sync failed");
                    RemoteWrite::Failed
                }
            };
            let _ = done.send(());
            outcome
        });
        RemoteSync { task: Some(task) }
    }
}

fn read_cache(cache: &dyn LocalCache) -> ProgressMap {
    let Some(text) = cache.get(PROGRESS_KEY) else {
        return ProgressMap::new();
    };
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "cached progress is not valid JSON, ignoring it");
            return ProgressMap::new();
        }
    };
    match decode_progress_map(&value) {
        Ok(decoded) => {
            for (key, err) in &decoded.rejected {
                tracing::warn!(topic = %key, error = %err, "skipping malformed cached progress");
            }
            tracing::debug!(topics = decoded.records.len(), "progress read from cache");
            decoded.records
        }
        Err(err) => {
            tracing::warn!(error = %err, "cached progress has the wrong shape, ignoring it");
            ProgressMap::new()
        }
    }
}

fn write_cache(cache: &dyn LocalCache, progress: &ProgressMap) {
    cache.set(PROGRESS_KEY, encode_progress_map(progress).to_string());
    tracing::debug!(topics = progress.len(), "progress written to cache");
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::Timestamp;
    use quiz_core::model::TopicDraft;
    use serde_json::json;
    use std::collections::BTreeMap;
    use storage::repository::{InMemoryRemoteStore, MemoryCache};
    use tokio::sync::Semaphore;

    /// Remote whose writes wait until the test opens the gate.
    struct GatedRemote {
        inner: InMemoryRemoteStore,
        gate: Semaphore,
    }

    #[async_trait::async_trait]
    impl RemoteScoreStore for GatedRemote {
        async fn read_score(
            &self,
            user: &UserId,
            topic: &TopicId,
        ) -> Result<Option<Value>, StorageError> {
            self.inner.read_score(user, topic).await
        }

        async fn read_scores(&self, user: &UserId) -> Result<BTreeMap<String, Value>, StorageError> {
            self.inner.read_scores(user).await
        }

        async fn write_score(
            &self,
            user: &UserId,
            topic: &TopicId,
            document: &Value,
        ) -> Result<(), StorageError> {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            self.inner.write_score(user, topic, document).await
        }

        async fn delete_score(&self, user: &UserId, topic: &TopicId) -> Result<(), StorageError> {
            self.inner.delete_score(user, topic).await
        }
    }

    fn topic(id: &str) -> TopicId {
        TopicId::new(id).unwrap()
    }

    fn catalog(totals: &[(&str, u32)]) -> Catalog {
        Catalog::from_drafts(
            totals
                .iter()
                .map(|(id, total)| TopicDraft {
                    id: topic(id),
                    title: id.to_uppercase(),
                    description: String::new(),
                    category: "math".into(),
                    icon: String::new(),
                    total_questions: *total,
                })
                .collect(),
        )
        .unwrap()
    }

    fn done(score: u32, total: u32, at: i64) -> ProgressRecord {
        ProgressRecord::completed(
            score,
            total,
            Vec::new(),
            Default::default(),
            Timestamp::from_millis(at),
        )
        .unwrap()
    }

    #[test]
    fn missing_record_reads_as_zero_progress() {
        let store = ProgressStore::new(
            catalog(&[("t1", 10)]),
            Arc::new(MemoryCache::new()),
            UserContext::anonymous(),
        );
        let progress = store.topic_progress(&topic("t1")).unwrap();
        assert_eq!(
            progress,
            TopicProgress {
                score: 0,
                percentage: 0,
                completed_questions: 0,
                total_questions: 10,
                is_completed: false,
            }
        );
        assert_eq!(store.topic_progress(&topic("unknown")), None);
    }

    #[test]
    fn anonymous_attempts_stay_local_and_survive_reopening() {
        let cache = Arc::new(MemoryCache::new());
        let mut store = ProgressStore::new(
            catalog(&[("t1", 4)]),
            cache.clone(),
            UserContext::anonymous(),
        );
        let sync = store.record_attempt(&topic("t1"), done(3, 4, 100));
        assert!(!sync.is_pending());

        let reopened =
            ProgressStore::new(catalog(&[("t1", 4)]), cache, UserContext::anonymous());
        assert_eq!(reopened.topic_progress(&topic("t1")).unwrap().percentage, 75);
    }

    #[tokio::test]
    async fn newer_remote_record_wins_and_is_written_back_to_cache() {
        let cache = Arc::new(MemoryCache::new());
        let remote = Arc::new(InMemoryRemoteStore::new());
        let user = UserId::new("u1").unwrap();

        let mut local = ProgressMap::new();
        local.insert(topic("t1"), done(1, 10, 100));
        cache.set(PROGRESS_KEY, encode_progress_map(&local).to_string());
        remote
            .write_score(&user, &topic("t1"), &done(9, 10, 200).to_document())
            .await
            .unwrap();
        remote
            .insert_raw("users/u1/scores/t2", json!("garbage"))
            .unwrap();

        let mut store = ProgressStore::new(
            catalog(&[("t1", 10), ("t2", 5)]),
            cache.clone(),
            UserContext::signed_in(user, remote),
        );
        let outcome = store.load().await;

        assert_eq!(
            outcome.remote,
            RemoteStatus::Merged {
                adopted: vec![topic("t1")],
                rejected: 1,
            }
        );
        assert_eq!(store.record(&topic("t1")).unwrap().score(), 9);
        let cached = read_cache(cache.as_ref());
        assert_eq!(cached[&topic("t1")].score(), 9);
    }

    #[tokio::test]
    async fn clearing_removes_both_copies() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        let user = UserId::new("u1").unwrap();
        let mut store = ProgressStore::new(
            catalog(&[("t1", 10)]),
            Arc::new(MemoryCache::new()),
            UserContext::signed_in(user.clone(), remote.clone()),
        );

        let written = store.record_attempt(&topic("t1"), done(5, 10, 100));
        assert_eq!(written.settled().await, RemoteWrite::Written);
        let cleared = store.clear_attempt(&topic("t1"));
        assert_eq!(cleared.settled().await, RemoteWrite::Written);

        assert!(store.record(&topic("t1")).is_none());
        assert!(remote.documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn clear_waits_for_an_earlier_slow_write() {
        let remote = Arc::new(GatedRemote {
            inner: InMemoryRemoteStore::new(),
            gate: Semaphore::new(0),
        });
        let mut store = ProgressStore::new(
            catalog(&[("t1", 10)]),
            Arc::new(MemoryCache::new()),
            UserContext::signed_in(UserId::new("u1").unwrap(), remote.clone()),
        );

        let written = store.record_attempt(&topic("t1"), done(5, 10, 100));
        let cleared = store.clear_attempt(&topic("t1"));
        tokio::task::yield_now().await;
        remote.gate.add_permits(1);

        assert_eq!(cleared.settled().await, RemoteWrite::Written);
        assert_eq!(written.settled().await, RemoteWrite::Written);
        assert!(remote.inner.documents().unwrap().is_empty());
        assert!(store.record(&topic("t1")).is_none());
    }

    #[test]
    fn top_topics_truncates_the_ranking() {
        let mut store = ProgressStore::new(
            catalog(&[("a", 10), ("b", 10), ("c", 10), ("d", 10)]),
            Arc::new(MemoryCache::new()),
            UserContext::anonymous(),
        );
        drop(store.record_attempt(&topic("c"), done(8, 10, 1)));
        drop(store.record_attempt(&topic("b"), done(2, 10, 1)));

        let top: Vec<_> = store
            .top_topics(3)
            .iter()
            .map(|ranked| ranked.topic.id().as_str().to_owned())
            .collect();
        assert_eq!(top, vec!["c", "b", "a"]);
    }
}
