use std::sync::Arc;

use quiz_core::model::TopicId;
use storage::content::ContentSource;
use storage::repository::LocalCache;

use super::session::QuizSession;
use crate::Clock;
use crate::catalog_service::current_topic;
use crate::error::DataLoadError;
use crate::progress_service::ProgressStore;

/// Opens quiz sessions: resolves the topic, loads its bank and applies saved progress.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    content: Arc<dyn ContentSource>,
    cache: Arc<dyn LocalCache>,
}

impl QuizService {
    #[must_use]
    pub fn new(clock: Clock, content: Arc<dyn ContentSource>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            clock,
            content,
            cache,
        }
    }

    /// Open a session for `topic`, or for the remembered topic when `None`.
    ///
    /// Only topics in the store's catalog open. Never fails: load problems
    /// come back as a session in `LoadFailed`.
    pub async fn open(
        &self,
        topic: Option<TopicId>,
        retake: bool,
        store: &ProgressStore,
    ) -> QuizSession {
        let topic = topic.or_else(|| current_topic(self.cache.as_ref()));
        let mut session = QuizSession::loading(self.clock, topic.clone());

        let Some(topic) = topic else {
            session.fail(&DataLoadError::NoTopicSelected);
            return session;
        };
        if store.catalog().get(&topic).is_none() {
            tracing::warn!(%topic, "quiz requested for a topic outside the catalog");
            session.fail(&DataLoadError::UnknownTopic(topic));
            return session;
        }

        match self.content.load_question_bank(&topic).await {
            Ok(bank) => {
                tracing::info!(%topic, questions = bank.questions().len(), retake, "quiz opened");
                if let Err(err) = session.begin(bank, store.record(&topic), retake) {
                    tracing::warn!(%topic, error = %err, "quiz session did not start");
                }
            }
            Err(err) => session.fail(&DataLoadError::from(err)),
        }
        session
    }
}
