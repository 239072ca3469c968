use std::sync::Arc;

use quiz_core::model::{Catalog, ProgressMap, Topic, TopicFilter, TopicId};
use quiz_core::stats::TopicProgress;
use storage::content::ContentSource;
use storage::repository::{CURRENT_TOPIC_KEY, LocalCache};

use crate::error::DataLoadError;

/// What a topic card offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicAction {
    Start,
    /// Some progress exists: resume where the user left off, or retake.
    ContinueOrRestart,
}

/// One entry of the topic list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCard<'a> {
    pub topic: &'a Topic,
    pub progress: TopicProgress,
    pub action: TopicAction,
}

/// Browsing the catalog and remembering the selected topic.
#[derive(Clone)]
pub struct CatalogService {
    content: Arc<dyn ContentSource>,
    cache: Arc<dyn LocalCache>,
}

impl CatalogService {
    #[must_use]
    pub fn new(content: Arc<dyn ContentSource>, cache: Arc<dyn LocalCache>) -> Self {
        Self { content, cache }
    }

    /// Fetch the topic catalog.
    ///
    /// # Errors
    ///
    /// Returns `DataLoadError::Content` if the catalog cannot be read or validated.
    pub async fn load_catalog(&self) -> Result<Catalog, DataLoadError> {
        self.content.load_catalog().await.map_err(|err| {
            tracing::warn!(error = %err, "topic catalog could not be loaded");
            DataLoadError::from(err)
        })
    }

    /// Topics matching `filter`, in catalog order, with their progress.
    #[must_use]
    pub fn topic_cards<'a>(
        catalog: &'a Catalog,
        progress: &ProgressMap,
        filter: &TopicFilter,
    ) -> Vec<TopicCard<'a>> {
        catalog
            .filter(filter)
            .into_iter()
            .map(|topic| {
                let progress = TopicProgress::for_topic(topic, progress.get(topic.id()));
                let action = if progress.has_started() {
                    TopicAction::ContinueOrRestart
                } else {
                    TopicAction::Start
                };
                TopicCard {
                    topic,
                    progress,
                    action,
                }
            })
            .collect()
    }

    /// Remember `topic` as the one to open when no topic is given.
    pub fn select_topic(&self, topic: &TopicId) {
        self.cache.set(CURRENT_TOPIC_KEY, topic.to_string());
        tracing::debug!(%topic, "topic selected");
    }

    /// The last selected topic, if it is still a valid id.
    #[must_use]
    pub fn current_topic(&self) -> Option<TopicId> {
        current_topic(self.cache.as_ref())
    }
}

pub(crate) fn current_topic(cache: &dyn LocalCache) -> Option<TopicId> {
    let raw = cache.get(CURRENT_TOPIC_KEY)?;
    match TopicId::new(raw) {
        Ok(topic) => Some(topic),
        Err(err) => {
            tracing::warn!(error = %err, "ignoring invalid remembered topic");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::Timestamp;
    use quiz_core::model::{CategoryFilter, ProgressRecord, TopicDraft};
    use storage::content::StaticContent;
    use storage::repository::MemoryCache;

    fn draft(id: &str, title: &str, category: &str) -> TopicDraft {
        TopicDraft {
            id: TopicId::new(id).unwrap(),
            title: title.into(),
            description: format!("About {title}"),
            category: category.into(),
            icon: String::new(),
            total_questions: 4,
        }
    }

    fn catalog() -> Catalog {
        Catalog::from_drafts(vec![
            draft("fractions", "Fractions", "math"),
            draft("verbs", "Verbs", "language"),
            draft("angles", "Angles", "math"),
        ])
        .unwrap()
    }

    #[test]
    fn cards_follow_filter_and_offer_resume_once_started() {
        let catalog = catalog();
        let mut progress = ProgressMap::new();
        progress.insert(
            TopicId::new("angles").unwrap(),
            ProgressRecord::completed(
                2,
                4,
                Vec::new(),
                Default::default(),
                Timestamp::from_millis(1),
            )
            .unwrap(),
        );

        let filter = TopicFilter {
            search: String::new(),
            category: CategoryFilter::parse("math"),
        };
        let cards = CatalogService::topic_cards(&catalog, &progress, &filter);

        let summary: Vec<_> = cards
            .iter()
            .map(|card| (card.topic.id().as_str(), card.action))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("fractions", TopicAction::Start),
                ("angles", TopicAction::ContinueOrRestart),
            ]
        );
        assert_eq!(cards[1].progress.percentage, 50);
    }

    #[tokio::test]
    async fn selected_topic_is_remembered() {
        let cache = Arc::new(MemoryCache::new());
        let service = CatalogService::new(Arc::new(StaticContent::new(catalog())), cache.clone());
        assert_eq!(service.current_topic(), None);

        let topic = TopicId::new("verbs").unwrap();
        service.select_topic(&topic);
        assert_eq!(service.current_topic(), Some(topic));

        cache.set(CURRENT_TOPIC_KEY, "bad/id".into());
        assert_eq!(service.current_topic(), None);
        assert_eq!(service.load_catalog().await.unwrap().len(), 3);
    }
}
