use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {0} has an empty prompt")]
    EmptyPrompt(QuestionId),

    #[error("question {id} needs at least two options, got {len}")]
    TooFewOptions { id: QuestionId, len: usize },

    #[error("question {id} marks option {index} correct but has {len} options")]
    CorrectAnswerOutOfRange {
        id: QuestionId,
        index: u32,
        len: usize,
    },

    #[error("duplicate question id: {0}")]
    DuplicateId(QuestionId),

    #[error("topic {0} has no questions")]
    Empty(TopicId),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Question as it appears in a question bank file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: QuestionId,
    #[serde(alias = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_answer_index: u32,
}

impl QuestionDraft {
    /// Validate option count and the correct-answer index.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` describing the first violated rule.
    pub fn validate(self) -> Result<Question, QuestionError> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt(self.id));
        }
        if self.options.len() < 2 {
            return Err(QuestionError::TooFewOptions {
                len: self.options.len(),
                id: self.id,
            });
        }
        if usize::try_from(self.correct_answer_index).map_or(true, |i| i >= self.options.len()) {
            return Err(QuestionError::CorrectAnswerOutOfRange {
                index: self.correct_answer_index,
                len: self.options.len(),
                id: self.id,
            });
        }

        Ok(Question {
            id: self.id,
            prompt: self.prompt,
            options: self.options,
            correct_answer_index: self.correct_answer_index,
        })
    }
}

/// A validated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    options: Vec<String>,
    correct_answer_index: u32,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_answer_index(&self) -> u32 {
        self.correct_answer_index
    }

    /// True when `index` names one of this question's options.
    #[must_use]
    pub fn has_option(&self, index: u32) -> bool {
        usize::try_from(index).is_ok_and(|i| i < self.options.len())
    }

    #[must_use]
    pub fn is_correct(&self, answer: Option<u32>) -> bool {
        answer == Some(self.correct_answer_index)
    }
}

//
// ─── QUESTION BANK ─────────────────────────────────────────────────────────────
//

/// Question bank file shape: `{ "title": ..., "questions": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionBankDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<QuestionDraft>,
}

impl QuestionBankDraft {
    /// Validate every question for the given topic.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::Empty` for a bank without questions, or the first
    /// per-question error.
    pub fn validate(self, topic_id: TopicId) -> Result<QuestionBank, QuestionError> {
        if self.questions.is_empty() {
            return Err(QuestionError::Empty(topic_id));
        }

        let mut seen = HashSet::with_capacity(self.questions.len());
        let mut questions = Vec::with_capacity(self.questions.len());
        for draft in self.questions {
            let question = draft.validate()?;
            if !seen.insert(question.id.clone()) {
                return Err(QuestionError::DuplicateId(question.id));
            }
            questions.push(question);
        }

        Ok(QuestionBank {
            topic_id,
            title: self.title,
            questions,
        })
    }
}

/// Ordered, non-empty list of questions for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionBank {
    topic_id: TopicId,
    title: String,
    questions: Vec<Question>,
}

impl QuestionBank {
    #[must_use]
    pub fn topic_id(&self) -> &TopicId {
        &self.topic_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn into_parts(self) -> (TopicId, String, Vec<Question>) {
        (self.topic_id, self.title, self.questions)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str, options: usize, correct: u32) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(id).unwrap(),
            prompt: "What?".into(),
            options: (0..options).map(|i| format!("option {i}")).collect(),
            correct_answer_index: correct,
        }
    }

    #[test]
    fn single_option_question_is_rejected() {
        let err = draft("q1", 1, 0).validate().unwrap_err();
        assert!(matches!(err, QuestionError::TooFewOptions { len: 1, .. }));
    }

    #[test]
    fn correct_index_must_name_an_option() {
        let err = draft("q1", 3, 3).validate().unwrap_err();
        assert!(matches!(err, QuestionError::CorrectAnswerOutOfRange { index: 3, .. }));
    }

    #[test]
    fn bank_rejects_duplicates_and_empty_lists() {
        let topic = TopicId::new("t").unwrap();
        let dup = QuestionBankDraft {
            title: "T".into(),
            questions: vec![draft("q1", 2, 0), draft("q1", 2, 1)],
        };
        assert!(matches!(
            dup.validate(topic.clone()).unwrap_err(),
            QuestionError::DuplicateId(_)
        ));

        let empty = QuestionBankDraft {
            title: "T".into(),
            questions: Vec::new(),
        };
        assert!(matches!(
            empty.validate(topic).unwrap_err(),
            QuestionError::Empty(_)
        ));
    }

    #[test]
    fn parses_content_file_field_names() {
        let json = r#"{
            "title": "Fractions",
            "questions": [
                {"id": 1, "question": "1/2 + 1/2?", "options": ["1", "2"], "correctAnswer": 0}
            ]
        }"#;
        let bank = serde_json::from_str::<QuestionBankDraft>(json)
            .unwrap()
            .validate(TopicId::new("fractions").unwrap())
            .unwrap();
        let q = &bank.questions()[0];
        assert_eq!(q.id().as_str(), "1");
        assert_eq!(q.prompt(), "1/2 + 1/2?");
        assert!(q.is_correct(Some(0)));
        assert!(!q.is_correct(None));
        assert!(q.has_option(1));
        assert!(!q.has_option(2));
    }
}
