//! Merging of locally cached progress with records fetched from the remote store.

use crate::model::{ProgressMap, TopicId};

/// What a merge changed in the local map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Topics whose remote record replaced (or filled in) the local one.
    pub adopted: Vec<TopicId>,
    /// Remote records ignored because the local one was at least as fresh.
    pub kept_local: usize,
}

impl ReconcileReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.adopted.is_empty()
    }
}

/// Merge `remote` into `local`, topic by topic.
///
/// A remote record wins when the topic has no local record or when its
/// `completed_at` is strictly later (absent counts as the epoch). Ties keep
/// the local record. Topics only present locally are untouched, so merging
/// the same snapshot twice leaves `local` as after the first merge.
pub fn reconcile(local: &mut ProgressMap, remote: ProgressMap) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for (topic_id, remote_record) in remote {
        let adopt = local
            .get(&topic_id)
            .is_none_or(|existing| remote_record.freshness() > existing.freshness());

        if adopt {
            local.insert(topic_id.clone(), remote_record);
            report.adopted.push(topic_id);
        } else {
            report.kept_local += 1;
        }
    }

    report
}
