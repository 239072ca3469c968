use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::TopicId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic title cannot be empty")]
    EmptyTitle,

    #[error("topic {0} must have at least one question")]
    NoQuestions(TopicId),

    #[error("duplicate topic id in catalog: {0}")]
    DuplicateId(TopicId),
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// Catalog entry as it appears in the static content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDraft {
    pub id: TopicId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub icon: String,
    pub total_questions: u32,
}

impl TopicDraft {
    /// Validate the draft into an immutable `Topic`.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` if the title is blank or the question count is zero.
    pub fn validate(self) -> Result<Topic, TopicError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(TopicError::EmptyTitle);
        }
        if self.total_questions == 0 {
            return Err(TopicError::NoQuestions(self.id));
        }

        Ok(Topic {
            id: self.id,
            title,
            description: self.description.trim().to_owned(),
            category: self.category.trim().to_owned(),
            icon: self.icon,
            total_questions: self.total_questions,
        })
    }
}

/// A named unit of quiz content with a fixed question count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    id: TopicId,
    title: String,
    description: String,
    category: String,
    icon: String,
    total_questions: u32,
}

impl Topic {
    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn icon(&self) -> &str {
        &self.icon
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    fn matches(&self, filter: &TopicFilter) -> bool {
        let category_ok = match &filter.category {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => self.category == *category,
        };
        if !category_ok {
            return false;
        }

        let needle = filter.search.trim().to_lowercase();
        needle.is_empty()
            || self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

//
// ─── FILTER ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// Parses a category selector; `"all"` (or blank) selects every category.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Only(raw.to_owned())
        }
    }
}

/// Search term plus category selection used when browsing the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    pub search: String,
    pub category: CategoryFilter,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Ordered, immutable list of topics. Catalog order is the stable tie-break for
/// every ranking derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    topics: Vec<Topic>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::DuplicateId` if two topics share an id.
    pub fn new(topics: Vec<Topic>) -> Result<Self, TopicError> {
        let mut seen = HashSet::with_capacity(topics.len());
        for topic in &topics {
            if !seen.insert(topic.id.clone()) {
                return Err(TopicError::DuplicateId(topic.id.clone()));
            }
        }
        Ok(Self { topics })
    }

    /// Validate every draft and build the catalog.
    ///
    /// # Errors
    ///
    /// Returns the first `TopicError` encountered.
    pub fn from_drafts(drafts: Vec<TopicDraft>) -> Result<Self, TopicError> {
        let topics = drafts
            .into_iter()
            .map(TopicDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(topics)
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &TopicId) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == *id)
    }

    /// Topics matching the filter, in catalog order.
    #[must_use]
    pub fn filter(&self, filter: &TopicFilter) -> Vec<&Topic> {
        self.topics.iter().filter(|t| t.matches(filter)).collect()
    }

    /// Distinct categories in first-seen order.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for topic in &self.topics {
            if !topic.category.is_empty() && !out.contains(&topic.category.as_str()) {
                out.push(&topic.category);
            }
        }
        out
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
