//! Derived progress views. Everything here is a pure function of the catalog
//! and a progress map and is recomputed on every call.

use crate::model::{Catalog, ProgressMap, ProgressRecord, Topic};
use crate::scoring::rounded_percent;

/// Progress of a single topic, ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicProgress {
    pub score: u32,
    pub percentage: u32,
    pub completed_questions: u32,
    pub total_questions: u32,
    pub is_completed: bool,
}

impl TopicProgress {
    /// Progress for `topic`; all zeros when there is no record.
    #[must_use]
    pub fn for_topic(topic: &Topic, record: Option<&ProgressRecord>) -> Self {
        let total = topic.total_questions();
        match record {
            Some(record) => Self {
                score: record.score(),
                percentage: rounded_percent(record.score(), total),
                completed_questions: record.completed_questions(),
                total_questions: total,
                is_completed: record.is_complete_for(total),
            },
            None => Self {
                score: 0,
                percentage: 0,
                completed_questions: 0,
                total_questions: total,
                is_completed: false,
            },
        }
    }

    /// Whether the topic card offers "continue" and "restart" instead of "start".
    #[must_use]
    pub fn has_started(&self) -> bool {
        self.percentage > 0
    }
}

/// A topic paired with its progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedTopic<'a> {
    pub topic: &'a Topic,
    pub progress: TopicProgress,
}

/// Every catalog topic with its progress, highest percentage first.
///
/// The sort is stable, so equal percentages keep catalog order.
#[must_use]
pub fn rank_topics<'a>(catalog: &'a Catalog, progress: &ProgressMap) -> Vec<RankedTopic<'a>> {
    let mut ranked: Vec<_> = catalog
        .topics()
        .iter()
        .map(|topic| RankedTopic {
            topic,
            progress: TopicProgress::for_topic(topic, progress.get(topic.id())),
        })
        .collect();
    ranked.sort_by(|a, b| b.progress.percentage.cmp(&a.progress.percentage));
    ranked
}

/// Cross-topic statistics for the summary and home views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverallStats {
    pub total_topics: u32,
    pub total_questions: u32,
    pub completed_questions: u32,
    pub total_score: u32,
    /// Sum of question counts over topics that have a record.
    pub total_possible_score: u32,
    pub completed_topics: u32,
    pub average_accuracy: u32,
}

/// Aggregate progress over the catalog.
///
/// Records for topics missing from the catalog are ignored. Accuracy is
/// measured against attempted topics only.
#[must_use]
pub fn overall_stats(catalog: &Catalog, progress: &ProgressMap) -> OverallStats {
    let mut stats = OverallStats {
        total_topics: u32::try_from(catalog.len()).unwrap_or(u32::MAX),
        ..OverallStats::default()
    };

    for topic in catalog.topics() {
        let total = topic.total_questions();
        stats.total_questions = stats.total_questions.saturating_add(total);

        let Some(record) = progress.get(topic.id()) else {
            continue;
        };
        stats.completed_questions = stats
            .completed_questions
            .saturating_add(record.completed_questions());
        stats.total_score = stats.total_score.saturating_add(record.score());
        stats.total_possible_score = stats.total_possible_score.saturating_add(total);
        if record.is_complete_for(total) {
            stats.completed_topics += 1;
        }
    }

    stats.average_accuracy = rounded_percent(stats.total_score, stats.total_possible_score);
    stats
}
