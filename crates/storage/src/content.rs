use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quiz_core::model::{
    Catalog, QuestionBank, QuestionBankDraft, QuestionError, TopicDraft, TopicError, TopicId,
};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while fetching static quiz content.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error("no question bank for topic {0}")]
    UnknownTopic(TopicId),

    #[error("could not read {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed content in {path}: {message}")]
    Malformed { path: String, message: String },

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Read-only source of the topic catalog and per-topic question banks.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetch and validate the topic catalog.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` if the catalog is missing, unreadable or invalid.
    async fn load_catalog(&self) -> Result<Catalog, ContentError>;

    /// Fetch and validate the question bank of one topic.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::UnknownTopic` if the topic has no bank, or other
    /// `ContentError`s if it cannot be read or validated.
    async fn load_question_bank(&self, topic: &TopicId) -> Result<QuestionBank, ContentError>;
}

#[derive(Deserialize)]
struct CatalogFile {
    topics: Vec<TopicDraft>,
}

/// Content laid out on disk as `topics.json` and `questions/{topicId}.json`.
#[derive(Debug, Clone)]
pub struct DirectoryContent {
    root: PathBuf,
}

impl DirectoryContent {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn catalog_path(&self) -> PathBuf {
        self.root.join("topics.json")
    }

    fn bank_path(&self, topic: &TopicId) -> PathBuf {
        self.root.join("questions").join(format!("{topic}.json"))
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ContentError> {
    let display = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ContentError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;
    serde_json::from_str(&text).map_err(|e| ContentError::Malformed {
        path: display,
        message: e.to_string(),
    })
}

#[async_trait]
impl ContentSource for DirectoryContent {
    async fn load_catalog(&self) -> Result<Catalog, ContentError> {
        let path = self.catalog_path();
        let file: CatalogFile = read_json(&path).await?;
        let catalog = Catalog::from_drafts(file.topics)?;
        tracing::debug!(path = %path.display(), topics = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    async fn load_question_bank(&self, topic: &TopicId) -> Result<QuestionBank, ContentError> {
        let path = self.bank_path(topic);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ContentError::UnknownTopic(topic.clone()));
        }
        let draft: QuestionBankDraft = read_json(&path).await?;
        let bank = draft.validate(topic.clone())?;
        tracing::debug!(%topic, questions = bank.questions().len(), "question bank loaded");
        Ok(bank)
    }
}

/// Content held in memory, for tests and embedded catalogs.
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    catalog: Catalog,
    banks: HashMap<TopicId, QuestionBank>,
}

impl StaticContent {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            banks: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_bank(mut self, bank: QuestionBank) -> Self {
        self.banks.insert(bank.topic_id().clone(), bank);
        self
    }
}

#[async_trait]
impl ContentSource for StaticContent {
    async fn load_catalog(&self) -> Result<Catalog, ContentError> {
        Ok(self.catalog.clone())
    }

    async fn load_question_bank(&self, topic: &TopicId) -> Result<QuestionBank, ContentError> {
        self.banks
            .get(topic)
            .cloned()
            .ok_or_else(|| ContentError::UnknownTopic(topic.clone()))
    }
}
